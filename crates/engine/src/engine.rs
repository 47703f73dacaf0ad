//! The Engine ties the storage gateway to a batch scheduler.
//!
//! Analyses and the collaborative-filtering recommender are methods on
//! [`Engine`]; they live in the module of the algorithm they run.

use crate::config::EngineConfig;
use crate::error::Result;
use data_loader::{
    AnalysisWriter, AvgRating, PredictorAssignment, RatingsReader, Similarity, StoreError,
};
use pipeline::{BatchScheduler, BatchSink};

/// Runs analyses against a store on a private worker pool.
pub struct Engine<'a, S: ?Sized> {
    pub(crate) store: &'a S,
    pub(crate) config: EngineConfig,
    pub(crate) scheduler: BatchScheduler,
}

impl<'a, S> Engine<'a, S>
where
    S: RatingsReader + AnalysisWriter + ?Sized,
{
    /// Validate `config` and start a worker pool sized by it.
    pub fn new(store: &'a S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = BatchScheduler::new(config.scheduler_config())?;
        Ok(Self {
            store,
            config,
            scheduler,
        })
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Commits each batch to the analysis tables in one write.
pub(crate) struct TableSink<'a, W: ?Sized> {
    writer: &'a W,
}

impl<'a, W: ?Sized> TableSink<'a, W> {
    pub(crate) fn new(writer: &'a W) -> Self {
        Self { writer }
    }
}

impl<W: AnalysisWriter + ?Sized> BatchSink<AvgRating> for TableSink<'_, W> {
    type Error = StoreError;

    fn flush(&mut self, batch: Vec<AvgRating>) -> std::result::Result<(), StoreError> {
        self.writer.write_avg_ratings(&batch)
    }
}

impl<W: AnalysisWriter + ?Sized> BatchSink<Similarity> for TableSink<'_, W> {
    type Error = StoreError;

    fn flush(&mut self, batch: Vec<Similarity>) -> std::result::Result<(), StoreError> {
        self.writer.write_similarities(&batch)
    }
}

/// Users without a usable predictor come through as `None` and are dropped.
impl<W: AnalysisWriter + ?Sized> BatchSink<Option<PredictorAssignment>> for TableSink<'_, W> {
    type Error = StoreError;

    fn flush(
        &mut self,
        batch: Vec<Option<PredictorAssignment>>,
    ) -> std::result::Result<(), StoreError> {
        let assignments: Vec<PredictorAssignment> = batch.into_iter().flatten().collect();
        self.writer.write_predictors(&assignments)
    }
}
