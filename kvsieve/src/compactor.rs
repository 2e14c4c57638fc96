//! Reference compaction pipeline that drives compaction filters.
//!
//! A [`Compactor`] executes [`CompactionJob`]s. Each job merges its input sorted
//! runs, keeps the newest version of every key, applies the compactor's tombstone
//! handling, and passes every surviving value through the filter created for that
//! run. The result is a new [`SortedRun`] for the job's destination.
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use kvsieve::config::CompactorOptions;
//! use kvsieve::{
//!     CompactionFilter, CompactionFilterDecision, CompactionFilterFactory, CompactionJob,
//!     Compactor, FnCompactionFilter, RowEntry, SortedRun,
//! };
//!
//! struct RedactFactory;
//!
//! impl CompactionFilterFactory for RedactFactory {
//!     fn create_compaction_filter(&self) -> Option<Box<dyn CompactionFilter>> {
//!         Some(Box::new(FnCompactionFilter::new("redact", |_level, _key, _value: &[u8]| {
//!             CompactionFilterDecision::Modify(Bytes::from_static(b"REDACTED"))
//!         })))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "RedactFactory"
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), kvsieve::Error> {
//! let compactor = Compactor::builder(CompactorOptions::default())
//!     .with_compaction_filter_factory(Arc::new(RedactFactory))
//!     .build()?;
//! let run = SortedRun::new(0, vec![RowEntry::new_value(b"user:1", b"secret", 1)])?;
//! let output = compactor.run_compaction(CompactionJob::new(1, 2, vec![run])).await?;
//! assert_eq!(output.key_values()[0].value, Bytes::from_static(b"REDACTED"));
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::compaction_filter::{display_name, CompactionFilterFactory, DefaultCompactionFilterFactory};
use crate::compaction_filter_iterator::CompactionFilterIterator;
use crate::compactor::stats::CompactionStats;
use crate::config::CompactorOptions;
use crate::db_state::{SortedRun, SortedRunIterator};
use crate::error::{Error, KvSieveError};
use crate::iter::KeyValueIterator;
use crate::merge_iterator::MergeIterator;
use crate::retention_iterator::RetentionIterator;
use crate::stats::StatRegistry;
use crate::types::RowEntry;

/// One compaction run: the input sorted runs and where their merged output goes.
#[derive(Clone, Debug)]
pub struct CompactionJob {
    /// The destination sorted run id. At most one run per destination executes at
    /// a time.
    pub destination: u32,
    /// The level handed to the compaction filter for every entry of this run.
    pub level: u32,
    /// The input runs.
    pub sorted_runs: Vec<SortedRun>,
    /// Whether the destination is the last (oldest) sorted run. Tombstones are
    /// elided from the output of such runs.
    pub is_dest_last_run: bool,
}

impl CompactionJob {
    pub fn new(destination: u32, level: u32, sorted_runs: Vec<SortedRun>) -> Self {
        Self {
            destination,
            level,
            sorted_runs,
            is_dest_last_run: false,
        }
    }

    pub fn with_dest_last_run(mut self, is_dest_last_run: bool) -> Self {
        self.is_dest_last_run = is_dest_last_run;
        self
    }
}

/// Builder for [`Compactor`].
pub struct CompactorBuilder {
    options: CompactorOptions,
    filter_factory: Option<Arc<dyn CompactionFilterFactory>>,
    cancellation_token: Option<CancellationToken>,
    stat_registry: Option<Arc<StatRegistry>>,
}

impl CompactorBuilder {
    pub fn new(options: CompactorOptions) -> Self {
        Self {
            options,
            filter_factory: None,
            cancellation_token: None,
            stat_registry: None,
        }
    }

    /// Sets the factory asked for a filter at the start of every run. Without one,
    /// [`DefaultCompactionFilterFactory`] is used and no entry is ever filtered.
    pub fn with_compaction_filter_factory(
        mut self,
        factory: Arc<dyn CompactionFilterFactory>,
    ) -> Self {
        self.filter_factory = Some(factory);
        self
    }

    /// Sets the token that stops the compactor. Cancelling it aborts in-flight runs.
    pub fn with_cancellation_token(mut self, cancellation_token: CancellationToken) -> Self {
        self.cancellation_token = Some(cancellation_token);
        self
    }

    /// Sets the registry the compactor's metrics are registered with.
    pub fn with_stat_registry(mut self, stat_registry: Arc<StatRegistry>) -> Self {
        self.stat_registry = Some(stat_registry);
        self
    }

    pub fn build(self) -> Result<Compactor, Error> {
        if self.options.max_concurrent_compactions == 0 {
            return Err(KvSieveError::InvalidMaxConcurrentCompactions.into());
        }
        let filter_factory = self
            .filter_factory
            .unwrap_or_else(|| Arc::new(DefaultCompactionFilterFactory));
        let stat_registry = self
            .stat_registry
            .unwrap_or_else(|| Arc::new(StatRegistry::new()));
        let stats = Arc::new(CompactionStats::new(stat_registry.clone()));
        info!(
            "compactor configured [filter_factory={}, max_concurrent_compactions={}]",
            display_name(filter_factory.name()),
            self.options.max_concurrent_compactions
        );
        Ok(Compactor {
            permits: Semaphore::new(self.options.max_concurrent_compactions),
            options: Arc::new(self.options),
            filter_factory,
            stats,
            stat_registry,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            running: Mutex::new(HashSet::new()),
        })
    }
}

/// Executes compaction jobs, creating one compaction filter per run.
pub struct Compactor {
    options: Arc<CompactorOptions>,
    filter_factory: Arc<dyn CompactionFilterFactory>,
    stats: Arc<CompactionStats>,
    stat_registry: Arc<StatRegistry>,
    cancellation_token: CancellationToken,
    /// Destinations with a run in flight.
    running: Mutex<HashSet<u32>>,
    permits: Semaphore,
}

impl Compactor {
    pub fn builder(options: CompactorOptions) -> CompactorBuilder {
        CompactorBuilder::new(options)
    }

    /// Returns the registry holding the metrics in [`stats`].
    pub fn metrics(&self) -> Arc<StatRegistry> {
        self.stat_registry.clone()
    }

    /// Stops the compactor. In-flight runs abort before their next entry and
    /// drop their filters; later runs fail immediately.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
        self.permits.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Executes a single compaction run and returns the destination [`SortedRun`].
    ///
    /// ## Steps
    /// - Asks the filter factory for a filter, exactly once.
    /// - Merges all input runs in ascending key order, keeping the newest version
    ///   of each key.
    /// - Elides tombstones when the destination is the last run.
    /// - Passes every surviving value through the filter, if there is one.
    ///
    /// ## Errors
    /// - [`crate::ErrorKind::Invalid`] if a run for the same destination is in flight.
    /// - [`crate::ErrorKind::Closed`] if the compactor is stopped before or during
    ///   the run. Partial output is discarded.
    #[instrument(level = "debug", skip_all, fields(destination = job.destination, level = job.level))]
    pub async fn run_compaction(&self, job: CompactionJob) -> Result<SortedRun, Error> {
        Ok(self.execute_compaction_job(job).await?)
    }

    /// Executes jobs concurrently, each on its own tokio task, and returns their
    /// results in input order. At most `max_concurrent_compactions` run at once.
    ///
    /// A panic inside a job (for instance in a user filter) fails only that job,
    /// with [`crate::ErrorKind::Internal`].
    pub async fn run_compactions(
        self: &Arc<Self>,
        jobs: Vec<CompactionJob>,
    ) -> Vec<Result<SortedRun, Error>> {
        let (destinations, tasks): (Vec<_>, Vec<_>) = jobs
            .into_iter()
            .map(|job| {
                let this = self.clone();
                let destination = job.destination;
                let task = tokio::spawn(async move { this.run_compaction(job).await });
                (destination, task)
            })
            .unzip();

        futures::future::join_all(tasks)
            .await
            .into_iter()
            .zip(destinations)
            .map(|(result, destination)| match result {
                Ok(result) => result,
                Err(join_error) => {
                    error!(
                        "compaction task failed [destination={}, error={}]",
                        destination, join_error
                    );
                    Err(KvSieveError::BackgroundTaskPanic(format!("compaction-{destination}")).into())
                }
            })
            .collect()
    }

    async fn execute_compaction_job(&self, job: CompactionJob) -> Result<SortedRun, KvSieveError> {
        if self.is_stopped() {
            return Err(KvSieveError::Closed);
        }
        let _running = RunningCompaction::register(self, job.destination)?;
        let _permit = tokio::select! {
            biased;
            _ = self.cancellation_token.cancelled() => return Err(KvSieveError::Closed),
            permit = self.permits.acquire() => permit.map_err(|_| KvSieveError::Closed)?,
        };

        let filter = self.filter_factory.create_compaction_filter();
        let filter_name = filter
            .as_ref()
            .map(|f| display_name(f.name()).to_string());
        info!(
            "starting compaction [destination={}, level={}, sources={}, filter_factory={}, filter={}]",
            job.destination,
            job.level,
            job.sorted_runs.len(),
            display_name(self.filter_factory.name()),
            filter_name.as_deref().unwrap_or("none"),
        );

        let merge_iter = MergeIterator::new(job.sorted_runs.iter().map(SortedRunIterator::new));
        let retention_iter = RetentionIterator::new(merge_iter, job.is_dest_last_run);

        let entries = match filter {
            Some(filter) => {
                self.stats.filters_created.inc();
                let mut filter_iter =
                    CompactionFilterIterator::new(retention_iter, filter, job.level, self.stats.clone());
                let entries = self.drain(&mut filter_iter).await?;
                if self.options.log_filter_summary {
                    let summary = filter_iter.summary();
                    info!(
                        "compaction filter finished [destination={}, filter={}, kept={}, modified={}, dropped={}]",
                        job.destination,
                        filter_name.as_deref().unwrap_or_default(),
                        summary.kept,
                        summary.modified,
                        summary.dropped,
                    );
                }
                entries
            }
            None => {
                let mut iter = retention_iter;
                self.drain(&mut iter).await?
            }
        };

        self.stats.compactions_completed.inc();
        debug!(
            "finished compaction [destination={}, entries={}]",
            job.destination,
            entries.len()
        );
        Ok(SortedRun::new_ordered(job.destination, entries))
    }

    async fn drain<T: KeyValueIterator>(&self, iter: &mut T) -> Result<Vec<RowEntry>, KvSieveError> {
        iter.init().await?;
        let mut entries = Vec::new();
        while let Some(entry) = iter.next_entry().await? {
            if self.is_stopped() {
                warn!(
                    "compaction cancelled, discarding partial output [entries={}]",
                    entries.len()
                );
                return Err(KvSieveError::Closed);
            }
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// Marks a destination as in flight until dropped, including on panic.
struct RunningCompaction<'a> {
    compactor: &'a Compactor,
    destination: u32,
}

impl<'a> RunningCompaction<'a> {
    fn register(compactor: &'a Compactor, destination: u32) -> Result<Self, KvSieveError> {
        let mut running = compactor.running.lock();
        if !running.insert(destination) {
            return Err(KvSieveError::DestinationInUse(destination));
        }
        compactor.stats.running_compactions.inc();
        Ok(Self {
            compactor,
            destination,
        })
    }
}

impl Drop for RunningCompaction<'_> {
    fn drop(&mut self) {
        self.compactor.running.lock().remove(&self.destination);
        self.compactor.stats.running_compactions.dec();
    }
}

pub mod stats {
    use crate::stats::{Counter, Gauge, StatRegistry};
    use std::sync::Arc;

    macro_rules! compactor_stat_name {
        ($suffix:expr) => {
            crate::stat_name!("compactor", $suffix)
        };
    }

    pub const RUNNING_COMPACTIONS: &str = compactor_stat_name!("running_compactions");
    pub const COMPACTIONS_COMPLETED: &str = compactor_stat_name!("compactions_completed");
    pub const FILTERS_CREATED: &str = compactor_stat_name!("filters_created");
    pub const ENTRIES_KEPT: &str = compactor_stat_name!("entries_kept");
    pub const ENTRIES_MODIFIED: &str = compactor_stat_name!("entries_modified");
    pub const ENTRIES_DROPPED: &str = compactor_stat_name!("entries_dropped");

    pub(crate) struct CompactionStats {
        pub(crate) running_compactions: Arc<Gauge<i64>>,
        pub(crate) compactions_completed: Arc<Counter>,
        pub(crate) filters_created: Arc<Counter>,
        pub(crate) entries_kept: Arc<Counter>,
        pub(crate) entries_modified: Arc<Counter>,
        pub(crate) entries_dropped: Arc<Counter>,
    }

    impl CompactionStats {
        pub(crate) fn new(stat_registry: Arc<StatRegistry>) -> Self {
            let stats = Self {
                running_compactions: Arc::new(Gauge::default()),
                compactions_completed: Arc::new(Counter::default()),
                filters_created: Arc::new(Counter::default()),
                entries_kept: Arc::new(Counter::default()),
                entries_modified: Arc::new(Counter::default()),
                entries_dropped: Arc::new(Counter::default()),
            };
            stat_registry.register(RUNNING_COMPACTIONS, stats.running_compactions.clone());
            stat_registry.register(COMPACTIONS_COMPLETED, stats.compactions_completed.clone());
            stat_registry.register(FILTERS_CREATED, stats.filters_created.clone());
            stat_registry.register(ENTRIES_KEPT, stats.entries_kept.clone());
            stat_registry.register(ENTRIES_MODIFIED, stats.entries_modified.clone());
            stat_registry.register(ENTRIES_DROPPED, stats.entries_dropped.clone());
            stats
        }
    }
}
