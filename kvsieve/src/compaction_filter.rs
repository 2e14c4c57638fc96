//! Compaction filter API for custom entry filtering during compaction.
//!
//! A [`CompactionFilterFactory`] is configured once on the [`crate::Compactor`]. At
//! the start of every compaction run the compactor asks the factory for a fresh
//! [`CompactionFilter`]. The filter is then consulted once per surviving key-value
//! pair, in the order the run visits them, and its [`CompactionFilterDecision`]
//! decides whether the pair is kept, rewritten, or removed from the output.
//!
//! **Warning:** filters run inside background compaction and their decisions are
//! final. A filter that returns the wrong decision silently rewrites or loses data.
//! There is no failure channel: a filter that cannot decide must return
//! [`CompactionFilterDecision::Keep`] and report the problem through logging.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use kvsieve::{CompactionFilter, CompactionFilterDecision, CompactionFilterFactory};
//!
//! /// Drops every entry under a key prefix, but only at the bottom level.
//! struct ExpirePrefixFilter {
//!     prefix: Bytes,
//!     bottom_level: u32,
//!     dropped: u64,
//! }
//!
//! impl CompactionFilter for ExpirePrefixFilter {
//!     fn filter(&mut self, level: u32, key: &[u8], _existing_value: &[u8]) -> CompactionFilterDecision {
//!         if level == self.bottom_level && key.starts_with(&self.prefix) {
//!             self.dropped += 1;
//!             CompactionFilterDecision::Drop
//!         } else {
//!             CompactionFilterDecision::Keep
//!         }
//!     }
//!
//!     fn name(&self) -> &str {
//!         "ExpirePrefixFilter"
//!     }
//! }
//!
//! struct ExpirePrefixFilterFactory {
//!     prefix: Bytes,
//!     bottom_level: u32,
//! }
//!
//! impl CompactionFilterFactory for ExpirePrefixFilterFactory {
//!     fn create_compaction_filter(&self) -> Option<Box<dyn CompactionFilter>> {
//!         Some(Box::new(ExpirePrefixFilter {
//!             prefix: self.prefix.clone(),
//!             bottom_level: self.bottom_level,
//!             dropped: 0,
//!         }))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "ExpirePrefixFilterFactory"
//!     }
//! }
//! ```

use bytes::Bytes;
use thiserror::Error;

/// Name substituted in diagnostics for a filter or factory with an empty name.
pub const UNKNOWN_NAME: &str = "unknown";

/// Decision returned by a compaction filter for each entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionFilterDecision {
    /// Keep the entry unchanged. The output value is bit-for-bit the existing value.
    Keep,
    /// Keep the entry but replace its value. The key and sequence number are
    /// unchanged.
    ///
    /// The replacement is written as-is, including an empty value.
    Modify(Bytes),
    /// Drop the entry entirely. The entry will not appear in the compaction output.
    ///
    /// WARNING: dropping an entry does not leave a tombstone. Older versions of the
    /// same key that live outside this compaction's inputs may become visible
    /// again. Only use `Drop` when this is acceptable.
    Drop,
}

impl CompactionFilterDecision {
    /// Converts the out-parameter form of a filter result into a decision.
    ///
    /// Some filters are written against a contract that returns `remove` and fills
    /// `new_value` plus a `value_changed` flag. This folds that shape into a
    /// decision at the boundary:
    ///
    /// - `remove` wins over everything else and yields [`CompactionFilterDecision::Drop`].
    /// - `value_changed` with a value yields [`CompactionFilterDecision::Modify`].
    /// - `value_changed` without a value is a contract violation and is rejected
    ///   with [`CompactionFilterError::MissingNewValue`].
    /// - Anything else yields [`CompactionFilterDecision::Keep`]. A `new_value`
    ///   supplied without `value_changed` is ignored.
    pub fn from_out_params(
        remove: bool,
        value_changed: bool,
        new_value: Option<Bytes>,
    ) -> Result<Self, CompactionFilterError> {
        if remove {
            return Ok(CompactionFilterDecision::Drop);
        }
        match (value_changed, new_value) {
            (true, Some(value)) => Ok(CompactionFilterDecision::Modify(value)),
            (true, None) => Err(CompactionFilterError::MissingNewValue),
            (false, _) => Ok(CompactionFilterDecision::Keep),
        }
    }
}

/// Errors raised at the boundary of the compaction filter contract.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompactionFilterError {
    /// A filter reported a changed value without supplying one. Treat this as a
    /// misconfigured filter.
    #[error("filter reported a changed value without supplying one")]
    MissingNewValue,
}

/// Filter that decides the fate of entries during a single compaction run.
///
/// Each filter instance is created for one compaction run by a
/// [`CompactionFilterFactory`] and is owned exclusively by that run. The run
/// calls [`CompactionFilter::filter`] sequentially from a single task, so the
/// filter may keep mutable state (counters, caches) without synchronization.
/// The filter is dropped when the run finishes or is aborted; there is no
/// separate cancellation hook, so release resources in `Drop`.
///
/// # Performance
///
/// `filter()` is called for every surviving entry and sits on the compaction hot
/// path. It must be synchronous, non-blocking, and fast.
pub trait CompactionFilter: Send {
    /// Decides what happens to one entry.
    ///
    /// `level` is the level of the compaction run handing the entry over. `key`
    /// and `existing_value` are only borrowed for the duration of the call; copy
    /// anything that must outlive it.
    ///
    /// For the same `(level, key, existing_value)` a filter should return the same
    /// decision within one run. Nothing enforces this.
    fn filter(&mut self, level: u32, key: &[u8], existing_value: &[u8])
        -> CompactionFilterDecision;

    /// Returns a name that identifies this filter in logs.
    ///
    /// Never used for decisions. An empty name is logged as [`UNKNOWN_NAME`].
    fn name(&self) -> &str;
}

/// Factory that creates a [`CompactionFilter`] instance per compaction run.
///
/// The factory is shared across all compactions and must be thread-safe
/// (`Send + Sync`). Concurrent runs call [`create_compaction_filter`] concurrently,
/// and each call must return an independent filter unless the factory documents
/// that the filters it hands out share state safely.
///
/// [`create_compaction_filter`]: CompactionFilterFactory::create_compaction_filter
pub trait CompactionFilterFactory: Send + Sync {
    /// Creates the filter for one compaction run.
    ///
    /// Returning `None` is a valid answer: the run then skips per-entry filtering
    /// entirely and never calls into a filter.
    fn create_compaction_filter(&self) -> Option<Box<dyn CompactionFilter>>;

    /// Returns a name that identifies this factory in logs.
    fn name(&self) -> &str;
}

/// The zero-configuration factory. It never produces a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultCompactionFilterFactory;

impl DefaultCompactionFilterFactory {
    pub const NAME: &'static str = "DefaultCompactionFilterFactory";
}

impl CompactionFilterFactory for DefaultCompactionFilterFactory {
    fn create_compaction_filter(&self) -> Option<Box<dyn CompactionFilter>> {
        None
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

/// A named [`CompactionFilter`] backed by a closure.
///
/// Handy for stateless policies. Stateful filters can capture their state in an
/// `FnMut` closure.
///
/// ```
/// use kvsieve::{CompactionFilter, CompactionFilterDecision, FnCompactionFilter};
///
/// let mut filter = FnCompactionFilter::new("drop-empty", |_level, _key, value: &[u8]| {
///     if value.is_empty() {
///         CompactionFilterDecision::Drop
///     } else {
///         CompactionFilterDecision::Keep
///     }
/// });
/// assert_eq!(filter.filter(0, b"k", b""), CompactionFilterDecision::Drop);
/// ```
pub struct FnCompactionFilter<F> {
    name: String,
    f: F,
}

impl<F> FnCompactionFilter<F>
where
    F: FnMut(u32, &[u8], &[u8]) -> CompactionFilterDecision + Send,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> CompactionFilter for FnCompactionFilter<F>
where
    F: FnMut(u32, &[u8], &[u8]) -> CompactionFilterDecision + Send,
{
    fn filter(
        &mut self,
        level: u32,
        key: &[u8],
        existing_value: &[u8],
    ) -> CompactionFilterDecision {
        (self.f)(level, key, existing_value)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Returns the name to log for a filter or factory, substituting
/// [`UNKNOWN_NAME`] when the name is empty.
pub fn display_name(name: &str) -> &str {
    if name.is_empty() {
        UNKNOWN_NAME
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    struct CountingFilter {
        seen: u64,
    }

    impl CompactionFilter for CountingFilter {
        fn filter(
            &mut self,
            _level: u32,
            _key: &[u8],
            _existing_value: &[u8],
        ) -> CompactionFilterDecision {
            self.seen += 1;
            CompactionFilterDecision::Modify(Bytes::from(self.seen.to_string()))
        }

        fn name(&self) -> &str {
            "CountingFilter"
        }
    }

    struct CountingFilterFactory {
        created: AtomicUsize,
    }

    impl CompactionFilterFactory for CountingFilterFactory {
        fn create_compaction_filter(&self) -> Option<Box<dyn CompactionFilter>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Some(Box::new(CountingFilter { seen: 0 }))
        }

        fn name(&self) -> &str {
            "CountingFilterFactory"
        }
    }

    #[test]
    fn test_default_factory_never_creates_a_filter() {
        let factory = DefaultCompactionFilterFactory;
        for _ in 0..100 {
            assert!(factory.create_compaction_filter().is_none());
        }
        assert_eq!(factory.name(), "DefaultCompactionFilterFactory");
    }

    #[test]
    fn test_default_factory_under_concurrent_runs() {
        const RUNS: usize = 16;
        let factory: Arc<dyn CompactionFilterFactory> = Arc::new(DefaultCompactionFilterFactory);
        let barrier = Arc::new(Barrier::new(RUNS));
        let handles: Vec<_> = (0..RUNS)
            .map(|_| {
                let factory = factory.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    (0..50).all(|_| factory.create_compaction_filter().is_none())
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn test_factory_filters_have_independent_state() {
        let factory = CountingFilterFactory {
            created: AtomicUsize::new(0),
        };
        let mut first = factory.create_compaction_filter().unwrap();
        let mut second = factory.create_compaction_filter().unwrap();

        for _ in 0..2 {
            first.filter(1, b"k", b"v");
        }
        assert_eq!(
            second.filter(1, b"k", b"v"),
            CompactionFilterDecision::Modify(Bytes::from_static(b"1"))
        );
        assert_eq!(
            first.filter(1, b"k", b"v"),
            CompactionFilterDecision::Modify(Bytes::from_static(b"3"))
        );

        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(first.name(), "CountingFilter");
        assert_eq!(second.name(), "CountingFilter");
    }

    #[rstest]
    #[case(false, false, None, Ok(CompactionFilterDecision::Keep))]
    #[case(false, false, Some(Bytes::from_static(b"ignored")), Ok(CompactionFilterDecision::Keep))]
    #[case(false, true, Some(Bytes::from_static(b"new")), Ok(CompactionFilterDecision::Modify(Bytes::from_static(b"new"))))]
    #[case(false, true, Some(Bytes::new()), Ok(CompactionFilterDecision::Modify(Bytes::new())))]
    #[case(false, true, None, Err(CompactionFilterError::MissingNewValue))]
    #[case(true, false, None, Ok(CompactionFilterDecision::Drop))]
    #[case(true, true, Some(Bytes::from_static(b"new")), Ok(CompactionFilterDecision::Drop))]
    #[case(true, true, None, Ok(CompactionFilterDecision::Drop))]
    fn test_from_out_params(
        #[case] remove: bool,
        #[case] value_changed: bool,
        #[case] new_value: Option<Bytes>,
        #[case] expected: Result<CompactionFilterDecision, CompactionFilterError>,
    ) {
        assert_eq!(
            CompactionFilterDecision::from_out_params(remove, value_changed, new_value),
            expected
        );
    }

    #[test]
    fn test_fn_filter_keeps_closure_state() {
        let mut calls = 0u32;
        {
            let mut filter = FnCompactionFilter::new("every-other", |_level, _key, _value: &[u8]| {
                calls += 1;
                if calls % 2 == 0 {
                    CompactionFilterDecision::Drop
                } else {
                    CompactionFilterDecision::Keep
                }
            });
            assert_eq!(filter.filter(0, b"a", b"1"), CompactionFilterDecision::Keep);
            assert_eq!(filter.filter(0, b"b", b"2"), CompactionFilterDecision::Drop);
            assert_eq!(filter.name(), "every-other");
        }
        assert_eq!(calls, 2);
    }

    #[rstest]
    #[case("", "unknown")]
    #[case("TtlFilter", "TtlFilter")]
    fn test_display_name(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(display_name(name), expected);
    }
}
