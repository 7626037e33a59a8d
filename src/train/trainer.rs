use rand::{rngs::StdRng, SeedableRng};

use crate::{
    data::tensor::ConnTensor,
    loss::mse::MseLoss,
    math::matrix::Matrix,
    network::network::ConnectomeNet,
    optim::adam::Adam,
    train::train_config::TrainConfig,
};

/// Result of one optimizer step on one minibatch.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Mean squared error of the batch, before the update.
    pub loss: f64,
    /// Batch predictions from the same forward pass (dropout active).
    pub predictions: Vec<f64>,
}

/// The numerical engine behind `train_loop`.
///
/// The loop only decides which instances go into which step; computing
/// gradients and updating parameters is the implementor's business. Each
/// call to `train_step` must finish its update before returning, so the
/// next step always sees the new parameters.
pub trait ModelTrainer {
    /// Forward pass, loss, backward pass and one parameter update for a
    /// `[batch, num_roi²]` input and its labels.
    fn train_step(&mut self, inputs: &Matrix, labels: &[f64]) -> StepOutput;

    /// Evaluation-mode predictions (no dropout) for every instance.
    fn predict(&self, data: &ConnTensor) -> Vec<f64>;
}

/// Owns one network and its optimizer state for the duration of one fold.
///
/// Built fresh per fold and dropped afterwards, so nothing learned on one
/// fold can leak into the next.
#[derive(Debug)]
pub struct ConnectomeTrainer {
    net: ConnectomeNet,
    optimizer: Adam,
    keep_probability: f64,
    rng: StdRng,
}

impl ConnectomeTrainer {
    /// `seed` drives the dropout masks.
    pub fn new(net: ConnectomeNet, config: &TrainConfig, seed: u64) -> ConnectomeTrainer {
        ConnectomeTrainer {
            net,
            optimizer: Adam::new(config.learning_rate),
            keep_probability: config.keep_probability,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn into_net(self) -> ConnectomeNet {
        self.net
    }

    pub fn steps_taken(&self) -> u64 {
        self.optimizer.steps()
    }
}

impl ModelTrainer for ConnectomeTrainer {
    fn train_step(&mut self, inputs: &Matrix, labels: &[f64]) -> StepOutput {
        let pass = self.net.feed_forward(inputs, self.keep_probability, &mut self.rng);
        let predictions = pass.predictions();
        let loss = MseLoss::loss(&predictions, labels);

        // Initial delta: ∂L/∂output
        let output_grad = Matrix::from_vec(labels.len(), 1, MseLoss::derivative(&predictions, labels));
        let grads = self.net.backward(&pass, &output_grad);
        self.net.apply_gradients(&grads, &mut self.optimizer);

        StepOutput { loss, predictions }
    }

    fn predict(&self, data: &ConnTensor) -> Vec<f64> {
        if data.is_empty() {
            return Vec::new();
        }
        self.net.predict(&data.to_matrix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::architecture::Architecture;

    #[test]
    fn repeated_steps_fit_a_single_batch() {
        let arch = Architecture { num_roi: 4, row_maps: 4, column_maps: 8, hidden: 6 };
        let mut rng = StdRng::seed_from_u64(21);
        let net = ConnectomeNet::xavier(arch, &mut rng).unwrap();
        let config = TrainConfig::new(4, 0, 1.0, 0.01);
        let mut trainer = ConnectomeTrainer::new(net, &config, 1);

        let inputs = Matrix::from_vec(4, 16, (0..64).map(|v| ((v * 13) % 7) as f64 / 7.0 - 0.5).collect());
        let labels = [0.5, -0.25, 0.75, 0.0];

        let first = trainer.train_step(&inputs, &labels).loss;
        let mut last = first;
        for _ in 0..300 {
            last = trainer.train_step(&inputs, &labels).loss;
        }
        assert!(last < first * 0.25, "loss went from {first} to {last}");
        assert_eq!(trainer.steps_taken(), 301);
    }
}
