use bytes::Bytes;

/// Represents a key-value pair known not to be a tombstone.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyValue {
    pub key: Bytes,
    pub value: Bytes,
}

impl<K, V> From<(&K, &V)> for KeyValue
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    fn from(record: (&K, &V)) -> Self {
        let key = Bytes::copy_from_slice(record.0.as_ref());
        let value = Bytes::copy_from_slice(record.1.as_ref());
        KeyValue { key, value }
    }
}

/// Represents a key-value pair that may be a tombstone.
///
/// This is the entry type carried through a compaction run.
#[derive(Debug, Clone, PartialEq)]
pub struct RowEntry {
    /// The key bytes.
    pub key: Bytes,
    /// The value, which may be a regular value or a tombstone.
    pub value: ValueDeletable,
    /// The sequence number of this entry. Higher is newer.
    pub seq: u64,
}

impl RowEntry {
    pub fn new(key: Bytes, value: ValueDeletable, seq: u64) -> Self {
        Self { key, value, seq }
    }

    /// Creates a live entry, copying the key and value.
    pub fn new_value(key: &[u8], value: &[u8], seq: u64) -> Self {
        Self {
            key: Bytes::copy_from_slice(key),
            value: ValueDeletable::Value(Bytes::copy_from_slice(value)),
            seq,
        }
    }

    /// Creates a deletion marker for `key`.
    pub fn new_tombstone(key: &[u8], seq: u64) -> Self {
        Self {
            key: Bytes::copy_from_slice(key),
            value: ValueDeletable::Tombstone,
            seq,
        }
    }

    /// Returns the entry as a [`KeyValue`], or `None` for tombstones.
    pub fn as_key_value(&self) -> Option<KeyValue> {
        self.value.as_bytes().map(|value| KeyValue {
            key: self.key.clone(),
            value,
        })
    }
}

/// Represents a value for a key.
///
/// Compaction filters are only consulted for [`ValueDeletable::Value`] entries.
/// Tombstones are handled by the compaction pipeline itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueDeletable {
    /// A regular value.
    Value(Bytes),
    /// A tombstone (deletion marker).
    Tombstone,
}

#[allow(clippy::len_without_is_empty)]
impl ValueDeletable {
    /// Returns the length of the value in bytes, or 0 for tombstones.
    pub fn len(&self) -> usize {
        match self {
            ValueDeletable::Value(v) => v.len(),
            ValueDeletable::Tombstone => 0,
        }
    }

    /// Returns true if this is a tombstone (deletion marker).
    pub fn is_tombstone(&self) -> bool {
        matches!(self, ValueDeletable::Tombstone)
    }

    /// Returns the value bytes, or None for a tombstone.
    pub fn as_bytes(&self) -> Option<Bytes> {
        match self {
            ValueDeletable::Value(v) => Some(v.clone()),
            ValueDeletable::Tombstone => None,
        }
    }
}
