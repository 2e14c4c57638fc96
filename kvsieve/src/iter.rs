use async_trait::async_trait;

use crate::error::KvSieveError;
use crate::types::RowEntry;

/// Note: this is intentionally its own trait instead of an Iterator<Item=RowEntry>,
/// so that sources backed by remote storage can load lazily during a run.
#[async_trait]
pub(crate) trait KeyValueIterator: Send {
    /// Performs any expensive initialization required before regular iteration.
    ///
    /// This method should be idempotent and can be called multiple times, only
    /// the first initialization should perform expensive operations.
    async fn init(&mut self) -> Result<(), KvSieveError>;

    /// Returns the next entry in the iterator, which may be a key-value pair or
    /// a tombstone of a deleted key-value pair.
    ///
    /// Will fail with `KvSieveError::IteratorNotInitialized` if the iterator is
    /// not yet initialized.
    async fn next_entry(&mut self) -> Result<Option<RowEntry>, KvSieveError>;
}

#[async_trait]
impl<'a> KeyValueIterator for Box<dyn KeyValueIterator + 'a> {
    async fn init(&mut self) -> Result<(), KvSieveError> {
        self.as_mut().init().await
    }

    async fn next_entry(&mut self) -> Result<Option<RowEntry>, KvSieveError> {
        self.as_mut().next_entry().await
    }
}
