#![doc = include_str!("../../README.md")]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![warn(clippy::panic)]
#![cfg_attr(test, allow(clippy::panic))]
#![allow(clippy::result_large_err)]

/// Re-export the bytes crate.
///
/// This is useful for users of the crate who want to return replacement values
/// from a compaction filter without having to depend on the bytes crate directly.
pub use bytes;

pub use compaction_filter::{
    display_name, CompactionFilter, CompactionFilterDecision, CompactionFilterError,
    CompactionFilterFactory, DefaultCompactionFilterFactory, FnCompactionFilter, UNKNOWN_NAME,
};
pub use compactor::stats as compactor_stats;
pub use compactor::{CompactionJob, Compactor, CompactorBuilder};
pub use db_state::SortedRun;
pub use error::{Error, ErrorKind};
pub use types::{KeyValue, RowEntry, ValueDeletable};

pub mod config;
pub mod stats;

mod compaction_filter;
mod compaction_filter_iterator;
mod compactor;
mod db_state;
mod error;
mod iter;
mod merge_iterator;
mod retention_iterator;
#[cfg(test)]
mod test_utils;
mod types;
