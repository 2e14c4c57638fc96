use async_trait::async_trait;

use crate::error::KvSieveError;
use crate::iter::KeyValueIterator;
use crate::types::RowEntry;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

struct MergeIteratorHeapEntry<'a> {
    next_kv: RowEntry,
    index: usize,
    iterator: Box<dyn KeyValueIterator + 'a>,
}

impl Eq for MergeIteratorHeapEntry<'_> {}

impl PartialEq<Self> for MergeIteratorHeapEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.next_kv == other.next_kv
    }
}

impl PartialOrd<Self> for MergeIteratorHeapEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeIteratorHeapEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // we'll wrap a Reverse in the BinaryHeap, so the cmp here is in increasing order.
        // the desired behavior is to return the entries with the lowest key first across keys
        // but the highest seqnum first within a key. ties on both fall back to the source
        // index so the order is total.
        match self.next_kv.key.cmp(&other.next_kv.key) {
            Ordering::Equal => match other.next_kv.seq.cmp(&self.next_kv.seq) {
                Ordering::Equal => self.index.cmp(&other.index),
                ord => ord, // descending seq
            },
            ord => ord, // ascending key
        }
    }
}

/// Merges sorted iterators into a single stream ordered by ascending key, newest
/// version first within a key.
pub(crate) struct MergeIterator<'a> {
    /// The current entry popped from the heap.
    current: Option<MergeIteratorHeapEntry<'a>>,
    /// Use a heap to perform merge sort.
    iterators: BinaryHeap<Reverse<MergeIteratorHeapEntry<'a>>>,
    /// Iterators that have not yet been initialized and seeded.
    pending_iterators: Vec<(usize, Box<dyn KeyValueIterator + 'a>)>,
    /// Tracks whether the iterator has performed its heavy initialization step.
    initialized: bool,
}

impl<'a> MergeIterator<'a> {
    pub(crate) fn new<T: KeyValueIterator + 'a>(iterators: impl IntoIterator<Item = T>) -> Self {
        Self {
            current: None,
            iterators: BinaryHeap::new(),
            pending_iterators: iterators
                .into_iter()
                .enumerate()
                .map(|(index, iterator)| {
                    (index, Box::new(iterator) as Box<dyn KeyValueIterator + 'a>)
                })
                .collect(),
            initialized: false,
        }
    }

    async fn initialize(&mut self) -> Result<(), KvSieveError> {
        if self.initialized {
            return Ok(());
        }

        for (index, mut iterator) in self.pending_iterators.drain(..) {
            iterator.init().await?;
            if let Some(next_kv) = iterator.next_entry().await? {
                self.iterators.push(Reverse(MergeIteratorHeapEntry {
                    next_kv,
                    index,
                    iterator,
                }));
            }
        }
        self.current = self.iterators.pop().map(|r| r.0);
        self.initialized = true;
        Ok(())
    }

    fn peek(&self) -> Option<&RowEntry> {
        self.current.as_ref().map(|c| &c.next_kv)
    }

    async fn advance(&mut self) -> Result<Option<RowEntry>, KvSieveError> {
        if let Some(mut iterator_state) = self.current.take() {
            let current_kv = iterator_state.next_kv;
            if let Some(kv) = iterator_state.iterator.next_entry().await? {
                iterator_state.next_kv = kv;
                self.iterators.push(Reverse(iterator_state));
            }
            self.current = self.iterators.pop().map(|r| r.0);
            return Ok(Some(current_kv));
        }
        Ok(None)
    }
}

#[async_trait]
impl KeyValueIterator for MergeIterator<'_> {
    async fn init(&mut self) -> Result<(), KvSieveError> {
        self.initialize().await
    }

    async fn next_entry(&mut self) -> Result<Option<RowEntry>, KvSieveError> {
        if !self.initialized {
            return Err(KvSieveError::IteratorNotInitialized);
        }
        let current_kv = match self.advance().await? {
            Some(kv) => kv,
            None => return Ok(None),
        };

        // the first entry for a key is the one with the highest seqnum. values and
        // tombstones both shadow everything older, so skip the remaining versions.
        while let Some(peeked_entry) = self.peek() {
            if peeked_entry.key != current_kv.key {
                break;
            }
            self.advance().await?;
        }

        Ok(Some(current_kv))
    }
}
