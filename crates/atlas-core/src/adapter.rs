//! The upstream interface: registry adapters.

use crate::error::FetchError;
use crate::record::{RawRecord, RegistrySource};

/// One registry fetch: the converted records plus how many payload items
/// could not be converted and were skipped.
#[derive(Debug, Default)]
pub struct FetchBatch {
    pub records: Vec<RawRecord>,
    pub invalid: usize,
}

/// A source of raw records for one registry.
///
/// Scraping lives behind this trait; the pipeline only sees strongly-typed
/// [`RawRecord`]s tagged with their registry. Implementations must be `Send`
/// so each registry can run on its own worker thread.
pub trait RegistryAdapter: Send {
    fn registry(&self) -> RegistrySource;

    /// Fetch every discoverable record. An `Err` fails this registry only;
    /// individual malformed items are skipped and counted in the batch, not
    /// turned into a fetch failure.
    fn fetch(&self) -> Result<FetchBatch, FetchError>;
}
