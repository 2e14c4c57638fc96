use async_trait::async_trait;

use crate::error::KvSieveError;
use crate::iter::KeyValueIterator;
use crate::types::RowEntry;

/// Applies the compaction's own tombstone handling.
///
/// Upstream must yield at most one version per key (see `MergeIterator`). A tombstone
/// only exists to shadow older versions of its key. When the destination is the last
/// (oldest) sorted run there is nothing older left to shadow, so tombstones are elided.
/// Otherwise they pass through untouched.
pub(crate) struct RetentionIterator<T: KeyValueIterator> {
    inner: T,
    is_dest_last_run: bool,
}

impl<T: KeyValueIterator> RetentionIterator<T> {
    pub(crate) fn new(inner: T, is_dest_last_run: bool) -> Self {
        Self {
            inner,
            is_dest_last_run,
        }
    }
}

#[async_trait]
impl<T: KeyValueIterator> KeyValueIterator for RetentionIterator<T> {
    async fn init(&mut self) -> Result<(), KvSieveError> {
        self.inner.init().await
    }

    async fn next_entry(&mut self) -> Result<Option<RowEntry>, KvSieveError> {
        while let Some(entry) = self.inner.next_entry().await? {
            if self.is_dest_last_run && entry.value.is_tombstone() {
                continue;
            }
            return Ok(Some(entry));
        }
        Ok(None)
    }
}
