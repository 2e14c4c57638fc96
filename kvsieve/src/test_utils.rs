use crate::error::KvSieveError;
use crate::iter::KeyValueIterator;
use crate::types::RowEntry;
use async_trait::async_trait;
use std::collections::VecDeque;

/// Asserts that the iterator returns the exact set of expected values in correct order.
pub(crate) async fn assert_iterator<T: KeyValueIterator>(iterator: &mut T, entries: Vec<RowEntry>) {
    for expected_entry in entries.iter() {
        assert_next_entry(iterator, expected_entry).await;
    }
    assert!(iterator
        .next_entry()
        .await
        .expect("iterator next_entry failed")
        .is_none());
}

pub(crate) async fn assert_next_entry<T: KeyValueIterator>(
    iterator: &mut T,
    expected_entry: &RowEntry,
) {
    let actual_entry = iterator
        .next_entry()
        .await
        .expect("iterator next_entry failed")
        .expect("expected iterator to return a value");
    assert_eq!(actual_entry, expected_entry.clone())
}

pub(crate) struct TestIterator {
    entries: VecDeque<Result<RowEntry, KvSieveError>>,
}

impl TestIterator {
    pub(crate) fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub(crate) fn with_entry(mut self, key: &'static [u8], val: &'static [u8], seq: u64) -> Self {
        let entry = RowEntry::new_value(key, val, seq);
        self.entries.push_back(Ok(entry));
        self
    }

    pub(crate) fn with_tombstone(mut self, key: &'static [u8], seq: u64) -> Self {
        let entry = RowEntry::new_tombstone(key, seq);
        self.entries.push_back(Ok(entry));
        self
    }

    pub(crate) fn with_error(mut self, err: KvSieveError) -> Self {
        self.entries.push_back(Err(err));
        self
    }
}

#[async_trait]
impl KeyValueIterator for TestIterator {
    async fn init(&mut self) -> Result<(), KvSieveError> {
        Ok(())
    }

    async fn next_entry(&mut self) -> Result<Option<RowEntry>, KvSieveError> {
        self.entries.pop_front().map_or(Ok(None), |e| match e {
            Ok(kv) => Ok(Some(kv)),
            Err(err) => Err(err),
        })
    }
}
