//! Progress reporting for long-running batch runs.
//!
//! The scheduler counts work items as it pulls them off the argument iterator
//! and sends a [`Progress::Fraction`] every `report_interval` items over a
//! bounded channel. A reporter runs on its own thread and reads until it sees
//! [`Progress::Done`], which is sent exactly once per run, whether the run
//! succeeds or not.

use std::sync::mpsc::{Receiver, SyncSender};

/// Messages sent from the scheduler to a reporter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// Share of the work items handed out so far, in [0, 1].
    Fraction(f64),
    /// No more messages will follow.
    Done,
}

/// A progress consumer. Invoked once, on a dedicated thread, with the
/// receiving end of the progress channel.
pub type Reporter = Box<dyn FnOnce(Receiver<Progress>) + Send + 'static>;

/// Build a [`Reporter`] from a callback that receives fractions.
///
/// The callback sees every `Fraction` and then a final `1.0` when the run
/// finishes.
pub fn reporter(mut on_progress: impl FnMut(f64) + Send + 'static) -> Reporter {
    Box::new(move |rx: Receiver<Progress>| {
        for message in rx {
            match message {
                Progress::Fraction(fraction) => on_progress(fraction),
                Progress::Done => {
                    on_progress(1.0);
                    break;
                }
            }
        }
    })
}

/// Wraps the argument iterator and reports how far through it we are.
pub(crate) struct ProgressTracker<I> {
    inner: I,
    sender: Option<SyncSender<Progress>>,
    yielded: usize,
    total: usize,
    interval: usize,
}

impl<I: Iterator> ProgressTracker<I> {
    pub(crate) fn new(
        inner: I,
        total: usize,
        interval: usize,
        sender: Option<SyncSender<Progress>>,
    ) -> Self {
        Self {
            inner,
            sender,
            yielded: 0,
            total,
            interval: interval.max(1),
        }
    }

    fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.yielded as f64 / self.total as f64).min(1.0)
        }
    }
}

impl<I: Iterator> Iterator for ProgressTracker<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Some(item) => {
                self.yielded += 1;
                if self.yielded % self.interval == 0 {
                    let fraction = self.fraction();
                    if let Some(sender) = &self.sender {
                        let _ = sender.send(Progress::Fraction(fraction));
                    }
                }
                Some(item)
            }
            None => {
                self.finish();
                None
            }
        }
    }
}

impl<I> ProgressTracker<I> {
    /// Send the terminal message. Later calls do nothing.
    fn finish(&mut self) {
        if let Some(sender) = self.sender.take() {
            // The reporter may already have hung up
            let _ = sender.send(Progress::Done);
        }
    }
}

impl<I> Drop for ProgressTracker<I> {
    fn drop(&mut self) {
        self.finish();
    }
}
