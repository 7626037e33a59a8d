use serde::{Serialize, Deserialize};

/// Progress snapshot emitted by `train_loop` every `report_every` steps.
///
/// When a `progress_tx` channel is configured in `TrainConfig`, one value is
/// sent per report. Diagnostic only: the numbers come from the current
/// minibatch (with dropout active), not from held-out data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    /// 0-based step index.
    pub step: usize,
    /// Total steps requested for this run.
    pub total_steps: usize,
    /// Mean squared error of the minibatch.
    pub loss: f64,
    /// R² of the minibatch predictions.
    pub r_squared: f64,
    /// Number of full passes started so far (1 during the first pass).
    pub epoch: usize,
}
