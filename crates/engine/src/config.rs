use crate::error::{EngineError, Result};
use pipeline::SchedulerConfig;
use serde::Deserialize;
use std::path::Path;

/// Tunables for analysis runs, loaded from an optional JSON file.
///
/// Every field has a default, so `{}` is a valid config file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Worker threads; host parallelism when absent
    #[serde(default)]
    pub jobs: Option<usize>,

    /// Batch size is this many items per worker thread
    #[serde(default = "default_jobs_per_worker_per_batch")]
    pub jobs_per_worker_per_batch: usize,

    /// Items between progress updates
    #[serde(default = "default_report_interval")]
    pub report_interval: usize,

    /// Fewer co-ratings than this and two movies score 0
    #[serde(default = "default_min_pairs_for_similarity")]
    pub min_pairs_for_similarity: usize,
}

fn default_jobs_per_worker_per_batch() -> usize {
    256
}

fn default_report_interval() -> usize {
    256
}

fn default_min_pairs_for_similarity() -> usize {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            jobs_per_worker_per_batch: default_jobs_per_worker_per_batch(),
            report_interval: default_report_interval(),
            min_pairs_for_similarity: default_min_pairs_for_similarity(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Override the worker count (default: host parallelism)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
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

    /// Configure the co-rating threshold for similarity (default: 1)
    pub fn with_min_pairs_for_similarity(mut self, min_pairs: usize) -> Self {
        self.min_pairs_for_similarity = min_pairs;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs == Some(0) {
            return Err(EngineError::InvalidConfig("jobs must be at least 1".into()));
        }
        if self.jobs_per_worker_per_batch == 0 {
            return Err(EngineError::InvalidConfig(
                "jobs_per_worker_per_batch must be at least 1".into(),
            ));
        }
        if self.report_interval == 0 {
            return Err(EngineError::InvalidConfig(
                "report_interval must be at least 1".into(),
            ));
        }
        if self.min_pairs_for_similarity == 0 {
            return Err(EngineError::InvalidConfig(
                "min_pairs_for_similarity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Scheduler sizing derived from this config.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let mut config = SchedulerConfig::default()
            .with_jobs_per_worker_per_batch(self.jobs_per_worker_per_batch)
            .with_report_interval(self.report_interval);
        if let Some(jobs) = self.jobs {
            config = config.with_jobs(jobs);
        }
        config
    }
}
