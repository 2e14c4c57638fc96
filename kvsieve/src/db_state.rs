use async_trait::async_trait;
use log::warn;

use crate::error::{Error, KvSieveError};
use crate::iter::KeyValueIterator;
use crate::types::{KeyValue, RowEntry};

/// An in-memory sorted run: entries in ascending key order, and for repeated keys
/// in descending sequence number order (newest first).
#[derive(Clone, Debug, PartialEq)]
pub struct SortedRun {
    pub(crate) id: u32,
    pub(crate) entries: Vec<RowEntry>,
}

impl SortedRun {
    /// Creates a sorted run, validating the entry order.
    ///
    /// ## Errors
    /// - [`crate::ErrorKind::Data`] if any entry is not strictly after the previous
    ///   one by `(key ascending, seq descending)`.
    pub fn new(id: u32, entries: Vec<RowEntry>) -> Result<Self, Error> {
        for (index, pair) in entries.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            let ordered = prev.key < next.key || (prev.key == next.key && prev.seq > next.seq);
            if !ordered {
                warn!(
                    "rejecting unsorted run [id={}, index={}, prev_key={:?}, next_key={:?}]",
                    id,
                    index + 1,
                    prev.key,
                    next.key
                );
                return Err(KvSieveError::UnsortedRun {
                    id,
                    index: index + 1,
                }
                .into());
            }
        }
        Ok(Self { id, entries })
    }

    /// Creates a run from entries already known to be ordered.
    pub(crate) fn new_ordered(id: u32, entries: Vec<RowEntry>) -> Self {
        debug_assert!(Self::new(id, entries.clone()).is_ok());
        Self { id, entries }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn entries(&self) -> &[RowEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the live key-value pairs of this run, skipping tombstones.
    pub fn key_values(&self) -> Vec<KeyValue> {
        self.entries
            .iter()
            .filter_map(RowEntry::as_key_value)
            .collect()
    }
}

/// Iterates over the entries of a borrowed [`SortedRun`].
pub(crate) struct SortedRunIterator<'a> {
    run: &'a SortedRun,
    next_index: usize,
    initialized: bool,
}

impl<'a> SortedRunIterator<'a> {
    pub(crate) fn new(run: &'a SortedRun) -> Self {
        Self {
            run,
            next_index: 0,
            initialized: false,
        }
    }
}

#[async_trait]
impl KeyValueIterator for SortedRunIterator<'_> {
    async fn init(&mut self) -> Result<(), KvSieveError> {
        self.initialized = true;
        Ok(())
    }

    async fn next_entry(&mut self) -> Result<Option<RowEntry>, KvSieveError> {
        if !self.initialized {
            return Err(KvSieveError::IteratorNotInitialized);
        }
        let entry = self.run.entries.get(self.next_index).cloned();
        if entry.is_some() {
            self.next_index += 1;
        }
        Ok(entry)
    }
}
