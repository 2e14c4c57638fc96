use std::sync::Arc;

use async_trait::async_trait;

use crate::compaction_filter::{CompactionFilter, CompactionFilterDecision};
use crate::compactor::stats::CompactionStats;
use crate::error::KvSieveError;
use crate::iter::KeyValueIterator;
use crate::types::{RowEntry, ValueDeletable};

/// Decision counts for one compaction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FilterSummary {
    pub(crate) kept: u64,
    pub(crate) modified: u64,
    pub(crate) dropped: u64,
}

/// Iterator that applies a compaction filter to entries during compaction.
///
/// The filter is consulted exactly once for every live value the inner iterator
/// yields, in iteration order. Tombstones pass through without consulting the
/// filter. The filter is owned by this iterator and dropped with it.
pub(crate) struct CompactionFilterIterator<T: KeyValueIterator> {
    inner: T,
    filter: Box<dyn CompactionFilter>,
    level: u32,
    stats: Arc<CompactionStats>,
    summary: FilterSummary,
}

impl<T: KeyValueIterator> CompactionFilterIterator<T> {
    pub(crate) fn new(
        inner: T,
        filter: Box<dyn CompactionFilter>,
        level: u32,
        stats: Arc<CompactionStats>,
    ) -> Self {
        Self {
            inner,
            filter,
            level,
            stats,
            summary: FilterSummary::default(),
        }
    }

    pub(crate) fn summary(&self) -> FilterSummary {
        self.summary
    }

    fn apply_filter(&mut self, entry: RowEntry) -> Option<RowEntry> {
        let decision = match &entry.value {
            ValueDeletable::Value(existing_value) => {
                self.filter.filter(self.level, &entry.key, existing_value)
            }
            ValueDeletable::Tombstone => return Some(entry),
        };

        match decision {
            CompactionFilterDecision::Keep => {
                self.summary.kept += 1;
                self.stats.entries_kept.inc();
                Some(entry)
            }
            CompactionFilterDecision::Drop => {
                self.summary.dropped += 1;
                self.stats.entries_dropped.inc();
                None
            }
            CompactionFilterDecision::Modify(new_value) => {
                self.summary.modified += 1;
                self.stats.entries_modified.inc();
                Some(RowEntry {
                    key: entry.key,
                    value: ValueDeletable::Value(new_value),
                    seq: entry.seq,
                })
            }
        }
    }
}

#[async_trait]
impl<T: KeyValueIterator> KeyValueIterator for CompactionFilterIterator<T> {
    async fn init(&mut self) -> Result<(), KvSieveError> {
        self.inner.init().await
    }

    async fn next_entry(&mut self) -> Result<Option<RowEntry>, KvSieveError> {
        while let Some(entry) = self.inner.next_entry().await? {
            if let Some(filtered) = self.apply_filter(entry) {
                return Ok(Some(filtered));
            }
            // Entry was dropped, get next
        }
        Ok(None)
    }
}
