//! Atomic JSON payload IO shared by snapshot and master-data storage.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Write bytes to `path` via a temporary sibling and an atomic rename, so a
/// crash mid-write never leaves a partial file under the final name.
/// Optionally zstd-compresses the payload.
pub fn write_atomic(path: &Path, bytes: &[u8], compress: bool) -> Result<()> {
    let payload = if compress {
        zstd::encode_all(bytes, 0).context("failed to compress payload")?
    } else {
        bytes.to_vec()
    };

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &payload).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to finalize {}", path.display()))?;
    Ok(())
}

/// Read a JSON file, transparently decompressing zstd payloads
/// (detected by magic bytes).
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let bytes = if bytes.starts_with(&ZSTD_MAGIC) {
        zstd::decode_all(bytes.as_slice())
            .with_context(|| format!("failed to decompress {}", path.display()))?
    } else {
        bytes
    };
    serde_json::from_slice(&bytes).with_context(|| format!("failed to parse {}", path.display()))
}
