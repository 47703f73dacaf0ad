//! Core traits for the batch scheduler.
//!
//! Work is split between two roles:
//! - a [`Worker`] computes one result from one argument and never writes
//! - a [`BatchSink`] receives whole batches of results and commits them
//!
//! Only the scheduler's caller holds the sink, so storage writes happen on the
//! scheduling thread between batches and never from inside the worker pool.

/// Pure computation over a single work item.
///
/// ## Design Note
/// - `Send + Sync` lets one worker be shared by every thread of the pool
/// - Arguments are taken by value so each item moves into the thread that
///   evaluates it
pub trait Worker: Send + Sync {
    /// A single unit of work
    type Arg: Send;
    /// The result of one unit of work
    type Output: Send;
    /// Failure of one unit of work; aborts the batch it belongs to
    type Error: Send;

    /// Returns the name of this worker (for logging/debugging)
    fn name(&self) -> &str;

    /// Compute the result for one argument.
    fn compute(&self, arg: Self::Arg) -> Result<Self::Output, Self::Error>;
}

/// Destination for completed batches.
pub trait BatchSink<T> {
    type Error;

    /// Commit one batch of results. Called once per batch, in batch order,
    /// with results in no particular order.
    fn flush(&mut self, batch: Vec<T>) -> Result<(), Self::Error>;
}

/// A sink that keeps every result in memory.
impl<T> BatchSink<T> for Vec<T> {
    type Error = std::convert::Infallible;

    fn flush(&mut self, batch: Vec<T>) -> Result<(), Self::Error> {
        self.extend(batch);
        Ok(())
    }
}
