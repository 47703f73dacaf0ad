//! Batched parallel job scheduling for analysis runs.
//!
//! This crate provides:
//! - `Worker` and `BatchSink` traits separating computation from writes
//! - `BatchScheduler` for running a worker over a lazy argument stream
//! - `Progress` messages and the `Reporter` callback type
//!
//! ## Architecture
//! Arguments are pulled lazily in batches of `jobs_per_worker_per_batch * jobs`.
//! Each batch is evaluated on the scheduler's rayon pool and handed to the sink
//! as one unit before the next batch is pulled, so memory stays bounded by a
//! single batch and the sink sees one write per batch.
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{BatchScheduler, SchedulerConfig};
//!
//! let scheduler = BatchScheduler::new(SchedulerConfig::default().with_jobs(4))?;
//! let mut results = Vec::new();
//! let summary = scheduler.run::<_, _, _, MyError>(
//!     users.iter().copied(),
//!     users.len(),
//!     &worker,
//!     &mut results,
//!     None,
//! )?;
//! ```

pub mod progress;
pub mod scheduler;
pub mod traits;

// Re-export main types
pub use progress::{reporter, Progress, Reporter};
pub use scheduler::{default_jobs, BatchScheduler, RunSummary, SchedulerConfig, SchedulerError};
pub use traits::{BatchSink, Worker};
