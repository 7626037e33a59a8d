use rand::Rng;

use crate::data::shuffle::shuffle_samples;
use crate::data::tensor::Samples;
use crate::error::{CcnnError, Result};
use crate::metrics::r_squared;
use crate::train::step_stats::StepStats;
use crate::train::train_config::{RemainderPolicy, TrainConfig};
use crate::train::trainer::ModelTrainer;

// ---------------------------------------------------------------------------
// Batch schedule
// ---------------------------------------------------------------------------

/// Maps a step index to the offset of its minibatch.
///
/// `offset = (step * batch_size) mod epoch_len`. An offset of zero marks the
/// start of an epoch, which is when the training set gets re-shuffled, so
/// within an epoch the batches are disjoint and cover `epoch_len` instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSchedule {
    batch_size: usize,
    epoch_len: usize,
}

impl StepSchedule {
    pub fn new(num_instances: usize, config: &TrainConfig) -> Result<StepSchedule> {
        config.validate()?;
        let batch_size = config.batch_size;
        if num_instances < batch_size {
            return Err(CcnnError::InvalidConfig(format!(
                "{num_instances} training instances cannot fill a batch of {batch_size}"
            )));
        }
        let remainder = num_instances % batch_size;
        let epoch_len = match (remainder, config.remainder) {
            (0, _) => num_instances,
            (_, RemainderPolicy::Reject) => {
                return Err(CcnnError::BatchRemainder { instances: num_instances, batch_size });
            }
            (r, RemainderPolicy::DropTail) => {
                log::warn!(
                    "Batch size {batch_size} leaves {r} of {num_instances} training instances out of each epoch"
                );
                num_instances - r
            }
        };
        Ok(StepSchedule { batch_size, epoch_len })
    }

    pub fn offset(&self, step: usize) -> usize {
        (step * self.batch_size) % self.epoch_len
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.epoch_len / self.batch_size
    }
}

// ---------------------------------------------------------------------------
// Training loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainState {
    Init,
    Running { step: usize },
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub steps: usize,
    /// Epochs started, i.e. how many times the training set was shuffled.
    pub epochs: usize,
    /// Minibatch loss of the last step (`NaN` when no step ran).
    pub final_loss: f64,
}

/// Runs exactly `config.num_steps` minibatch steps of `trainer` over `train`.
///
/// `train` is re-shuffled in place at every epoch boundary (including step
/// 0), then each step trains on the contiguous slice starting at the
/// schedule's offset. Every `config.report_every` steps the minibatch loss and
/// R² are logged and, if configured, sent on `config.progress_tx`.
///
/// # Errors
/// Fails before the first step if the configuration is invalid or does not
/// fit the size of `train` (see `StepSchedule::new`).
pub fn train_loop<T, R>(
    trainer: &mut T,
    train: &mut Samples,
    config: &TrainConfig,
    rng: &mut R,
) -> Result<TrainSummary>
where
    T: ModelTrainer + ?Sized,
    R: Rng + ?Sized,
{
    let schedule = StepSchedule::new(train.len(), config)?;
    let batch_size = config.batch_size;

    let mut summary = TrainSummary { steps: 0, epochs: 0, final_loss: f64::NAN };
    let mut state = TrainState::Init;

    loop {
        state = match state {
            TrainState::Init => {
                log::debug!(
                    "Training {} steps over {} instances ({} batches per epoch)",
                    config.num_steps,
                    train.len(),
                    schedule.batches_per_epoch()
                );
                if config.num_steps == 0 {
                    TrainState::Done
                } else {
                    TrainState::Running { step: 0 }
                }
            }
            TrainState::Running { step } => {
                let offset = schedule.offset(step);
                // Seen every training instance once: re-randomize the order
                if offset == 0 {
                    shuffle_samples(train, rng);
                    summary.epochs += 1;
                }

                let inputs = train.data.rows(offset, batch_size);
                let labels = &train.labels[offset..offset + batch_size];
                let output = trainer.train_step(&inputs, labels);
                summary.steps += 1;
                summary.final_loss = output.loss;

                if step % config.report_every == 0 {
                    report(step, summary.epochs, labels, &output.predictions, output.loss, config);
                }

                if step + 1 >= config.num_steps {
                    TrainState::Done
                } else {
                    TrainState::Running { step: step + 1 }
                }
            }
            TrainState::Done => break,
        };
    }

    Ok(summary)
}

fn report(step: usize, epoch: usize, labels: &[f64], predictions: &[f64], loss: f64, config: &TrainConfig) {
    let rsq = r_squared(labels, predictions);
    log::info!("Minibatch loss at step {}: {:.6}", step, loss);
    log::info!("Minibatch R squared: {:.2}", rsq);

    if let Some(ref tx) = config.progress_tx {
        // Progress is diagnostic; a gone receiver must not stop training.
        let _ = tx.send(StepStats {
            step,
            total_steps: config.num_steps,
            loss,
            r_squared: rsq,
            epoch,
        });
    }
}
