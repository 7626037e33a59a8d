use std::sync::mpsc;

use serde::{Serialize, Deserialize};

use crate::error::{CcnnError, Result};
use crate::train::step_stats::StepStats;

/// What to do when the batch size does not divide the training set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Refuse to train; no instance is ever silently left out.
    #[default]
    Reject,
    /// Each epoch covers the largest multiple of the batch size; the tail of
    /// the shuffled order is skipped and re-drawn next epoch.
    DropTail,
}

/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `batch_size`       — instances per minibatch
/// - `num_steps`        — exact number of optimizer steps; there is no early stopping
/// - `keep_probability` — dropout retention during training (evaluation always uses 1)
/// - `learning_rate`    — Adam step size
/// - `report_every`     — progress is logged every this many steps
/// - `remainder`        — policy for a batch size that does not divide the training set
/// - `progress_tx`      — optional channel sender; one `StepStats` is sent per
///                        report. A dropped receiver does not stop training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub num_steps: usize,
    pub keep_probability: f64,
    pub learning_rate: f64,
    pub report_every: usize,
    #[serde(default)]
    pub remainder: RemainderPolicy,
    #[serde(skip)]
    pub progress_tx: Option<mpsc::Sender<StepStats>>,
}

impl TrainConfig {
    /// Creates a `TrainConfig` with no progress channel and the `Reject`
    /// remainder policy.
    pub fn new(batch_size: usize, num_steps: usize, keep_probability: f64, learning_rate: f64) -> Self {
        TrainConfig {
            batch_size,
            num_steps,
            keep_probability,
            learning_rate,
            report_every: 400,
            remainder: RemainderPolicy::Reject,
            progress_tx: None,
        }
    }

    /// Settings of the fully trainable network.
    pub fn baseline() -> Self {
        TrainConfig::new(4, 15001, 0.6, 0.0005)
    }

    /// Settings when only the fully connected layers are trained.
    pub fn transfer() -> Self {
        TrainConfig { report_every: 500, ..TrainConfig::new(4, 10001, 0.6, 0.0005) }
    }

    /// Checks the hyperparameters on their own, independent of any data.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CcnnError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if !(self.keep_probability > 0.0 && self.keep_probability <= 1.0) {
            return Err(CcnnError::InvalidConfig(format!(
                "keep_probability must be in (0, 1], got {}",
                self.keep_probability
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(CcnnError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.report_every == 0 {
            return Err(CcnnError::InvalidConfig("report_every must be at least 1".into()));
        }
        Ok(())
    }
}
