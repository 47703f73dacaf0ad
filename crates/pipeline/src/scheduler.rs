//! The BatchScheduler drives a worker over a lazy stream of arguments.
//!
//! ## Algorithm
//! 1. Pull up to `batch_size` arguments off the iterator
//! 2. Evaluate them in parallel on a dedicated rayon pool, unordered
//! 3. Hand every result of the batch to the sink in one call
//! 4. Repeat until the iterator is exhausted
//!
//! A failed item aborts its batch before the flush, so a batch is written
//! completely or not at all. Batches flushed earlier stay committed.

use crate::progress::{ProgressTracker, Reporter};
use crate::traits::{BatchSink, Worker};
use rayon::prelude::*;
use std::sync::mpsc::sync_channel;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Number of progress messages the channel buffers before the scheduler
/// waits on the reporter.
const PROGRESS_CHANNEL_CAPACITY: usize = 1024;

/// Errors raised by the scheduler itself (as opposed to its workers or sink).
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to start progress reporter: {0}")]
    ReporterSpawn(std::io::Error),

    #[error("Progress reporter panicked")]
    ReporterPanicked,
}

/// Sizing of the worker pool and its batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of worker threads
    pub jobs: usize,
    /// Batch size is this many items per worker
    pub jobs_per_worker_per_batch: usize,
    /// Send a progress update after this many items
    pub report_interval: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            jobs_per_worker_per_batch: 256,
            report_interval: 256,
        }
    }
}

/// Host parallelism, or one worker if it cannot be determined.
pub fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl SchedulerConfig {
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_jobs_per_worker_per_batch(mut self, per_worker: usize) -> Self {
        self.jobs_per_worker_per_batch = per_worker;
        self
    }

    pub fn with_report_interval(mut self, interval: usize) -> Self {
        self.report_interval = interval;
        self
    }

    /// Items per batch: `jobs_per_worker_per_batch * jobs`.
    pub fn batch_size(&self) -> usize {
        self.jobs_per_worker_per_batch.saturating_mul(self.jobs)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.jobs == 0 {
            return Err(SchedulerError::InvalidConfig("jobs must be at least 1".into()));
        }
        if self.jobs_per_worker_per_batch == 0 {
            return Err(SchedulerError::InvalidConfig(
                "jobs_per_worker_per_batch must be at least 1".into(),
            ));
        }
        if self.report_interval == 0 {
            return Err(SchedulerError::InvalidConfig(
                "report_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// What a completed run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Work items computed and flushed
    pub items: usize,
    /// Batches flushed
    pub batches: usize,
    pub elapsed: Duration,
}

/// The reporter thread of one run. Joined on drop, so a worker panic that
/// unwinds through `run` still waits for the reporter to see `Done`.
///
/// Must be declared before the `ProgressTracker` in `run`: locals drop in
/// reverse order, so the tracker sends `Done` before this joins.
struct ReporterThread(Option<JoinHandle<()>>);

impl ReporterThread {
    /// Join the thread, returning whether the reporter panicked.
    fn join(mut self) -> bool {
        self.0.take().is_some_and(|handle| handle.join().is_err())
    }
}

impl Drop for ReporterThread {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            let _ = handle.join();
        }
    }
}

/// Runs workers in bounded batches on a private thread pool.
pub struct BatchScheduler {
    pool: rayon::ThreadPool,
    config: SchedulerConfig,
}

impl BatchScheduler {
    /// Build a scheduler and its worker pool.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.jobs)
            .thread_name(|i| format!("analysis-worker-{}", i))
            .build()?;
        Ok(Self { pool, config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Evaluate `worker` over every argument and flush results batch by batch.
    ///
    /// `total` is the number of arguments the iterator will yield; it only
    /// scales progress fractions. When `reporter` is given it runs on its own
    /// thread and is joined before this returns, or before a worker panic
    /// propagates to the caller.
    ///
    /// # Returns
    /// * `Ok(RunSummary)` - Every batch was computed and flushed
    /// * `Err` - The first worker, sink or scheduler failure
    #[instrument(skip_all, fields(worker = worker.name(), total = total, jobs = self.config.jobs))]
    pub fn run<W, S, I, E>(
        &self,
        args: I,
        total: usize,
        worker: &W,
        sink: &mut S,
        reporter: Option<Reporter>,
    ) -> Result<RunSummary, E>
    where
        W: Worker,
        S: BatchSink<W::Output>,
        I: IntoIterator<Item = W::Arg>,
        E: From<W::Error> + From<S::Error> + From<SchedulerError>,
    {
        let start = Instant::now();

        let (sender, reporter_thread) = match reporter {
            Some(report) => {
                let (tx, rx) = sync_channel(PROGRESS_CHANNEL_CAPACITY);
                let handle = thread::Builder::new()
                    .name("progress-reporter".to_string())
                    .spawn(move || report(rx))
                    .map_err(SchedulerError::ReporterSpawn)?;
                (Some(tx), ReporterThread(Some(handle)))
            }
            None => (None, ReporterThread(None)),
        };

        let mut args = ProgressTracker::new(
            args.into_iter(),
            total,
            self.config.report_interval,
            sender,
        );
        let outcome: Result<RunSummary, E> = self.run_batches(&mut args, worker, sink);
        // Dropping the tracker sends Done if the iterator was not exhausted
        drop(args);

        let reporter_panicked = reporter_thread.join();

        let mut summary = outcome?;
        if reporter_panicked {
            return Err(SchedulerError::ReporterPanicked.into());
        }
        summary.elapsed = start.elapsed();

        info!(
            items = summary.items,
            batches = summary.batches,
            "{} finished in {:?}",
            worker.name(),
            summary.elapsed
        );
        Ok(summary)
    }

    fn run_batches<W, S, I, E>(
        &self,
        args: &mut I,
        worker: &W,
        sink: &mut S,
    ) -> Result<RunSummary, E>
    where
        W: Worker,
        S: BatchSink<W::Output>,
        I: Iterator<Item = W::Arg>,
        E: From<W::Error> + From<S::Error>,
    {
        let batch_size = self.config.batch_size();
        let mut summary = RunSummary::default();

        loop {
            let batch: Vec<W::Arg> = args.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            let len = batch.len();

            let results = self.pool.install(|| {
                batch
                    .into_par_iter()
                    .map(|arg| worker.compute(arg))
                    .collect::<Result<Vec<_>, W::Error>>()
            })?;

            sink.flush(results)?;
            summary.items += len;
            summary.batches += 1;
            debug!(
                "{}: flushed batch {} ({} items, {} total)",
                worker.name(),
                summary.batches,
                len,
                summary.items
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_scales_with_jobs() {
        let config = SchedulerConfig::default()
            .with_jobs(4)
            .with_jobs_per_worker_per_batch(256);
        assert_eq!(config.batch_size(), 1024);
    }

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(SchedulerConfig::default().with_jobs(0).validate().is_err());
        assert!(SchedulerConfig::default()
            .with_report_interval(0)
            .validate()
            .is_err());
        assert!(BatchScheduler::new(SchedulerConfig::default().with_jobs_per_worker_per_batch(0)).is_err());
    }
}
