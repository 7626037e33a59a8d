use rand::Rng;

use crate::{
    activation::activation::ActivationFunction,
    layers::param::Param,
    math::matrix::{hadamard, Matrix},
};

#[derive(Debug)]
pub struct Dense {
    pub size: usize,
    pub weights: Param,
    pub biases: Param,
    pub activator: ActivationFunction,
    inputs: Matrix,       // last batch fed through `feed_from`
    pre_neurons: Matrix,  // pre-activation values (z = xW + b) needed for correct derivative
}

/// Gradients of one layer for one batch.
///
/// `weights`/`biases` are `None` when the corresponding parameter is frozen.
/// `delta` is ∂L/∂z, kept so the caller can propagate into the layer below.
#[derive(Debug, Clone)]
pub struct LayerGradients {
    pub weights: Option<Matrix>,
    pub biases: Option<Matrix>,
    pub delta: Matrix,
}

impl Dense {
    /// Xavier-initialized weights and constant biases.
    ///
    /// `fans` overrides the fan-in/fan-out used by the initializer; dense
    /// layers pass `(input_size, size)`, convolutions their receptive field.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        size: usize,
        activation: ActivationFunction,
        bias: f64,
        fans: (usize, usize),
        rng: &mut R,
    ) -> Dense {
        let weights = Matrix::glorot_uniform(input_size, size, fans.0, fans.1, rng);
        let biases = Matrix::filled(1, size, bias);
        Dense::from_params(Param::trainable(weights), Param::trainable(biases), activation)
    }

    pub fn from_params(weights: Param, biases: Param, activation: ActivationFunction) -> Dense {
        assert_eq!(biases.value.rows, 1, "biases must be a row vector");
        assert_eq!(weights.value.cols, biases.value.cols, "weights and biases disagree on layer size");
        Dense {
            size: weights.value.cols,
            weights,
            biases,
            activator: activation,
            inputs: Matrix::default(),
            pre_neurons: Matrix::default(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.value.rows
    }

    pub fn is_frozen(&self) -> bool {
        self.weights.frozen && self.biases.frozen
    }

    /// Training-mode forward pass over a `[batch, input_size]` matrix.
    /// Keeps the inputs and pre-activations for `compute_gradients`.
    pub fn feed_from(&mut self, inputs: Matrix) -> Matrix {
        let z = self.linear(&inputs);
        let a = z.map(|x| self.activator.function(x));
        self.inputs = inputs;
        self.pre_neurons = z;
        a
    }

    /// Stateless forward pass used for evaluation.
    pub fn infer(&self, inputs: &Matrix) -> Matrix {
        self.linear(inputs).map(|x| self.activator.function(x))
    }

    fn linear(&self, inputs: &Matrix) -> Matrix {
        let mut z = inputs.matmul(&self.weights.value);
        z.add_row_vector(&self.biases.value);
        z
    }

    /// Computes gradient adjustments for the last `feed_from` batch.
    /// `activation_grad` is ∂L/∂a for this layer (error in activation space).
    pub fn compute_gradients(&self, activation_grad: &Matrix) -> LayerGradients {
        // Use pre-activation z so that derivative(z) = σ'(z) is computed correctly
        let act_derivative = self.pre_neurons.map(|x| self.activator.derivative(x));
        // δ = error ⊙ σ'(z)
        let delta = hadamard(activation_grad, &act_derivative);

        let weights = (!self.weights.frozen).then(|| self.inputs.t_matmul(&delta));
        let biases = (!self.biases.frozen).then(|| delta.column_sums());

        LayerGradients { weights, biases, delta }
    }

    /// Propagates δ through the weights to get ∂L/∂a of the layer below.
    pub fn propagate(&self, delta: &Matrix) -> Matrix {
        delta.matmul_t(&self.weights.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(activation: ActivationFunction) -> Dense {
        Dense::from_params(
            Param::trainable(Matrix::from_vec(2, 1, vec![2.0, -1.0])),
            Param::trainable(Matrix::from_vec(1, 1, vec![0.5])),
            activation,
        )
    }

    #[test]
    fn forward_applies_weights_bias_and_activation() {
        let dense = layer(ActivationFunction::ReLU);
        let out = dense.infer(&Matrix::from_vec(2, 2, vec![1.0, 1.0, 0.0, 3.0]));
        // 2 - 1 + 0.5 = 1.5 ; 0 - 3 + 0.5 < 0 -> 0
        assert_eq!(out.data, vec![1.5, 0.0]);
    }

    #[test]
    fn gradients_of_linear_layer() {
        let mut dense = layer(ActivationFunction::Identity);
        dense.feed_from(Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]));
        let grads = dense.compute_gradients(&Matrix::from_vec(2, 1, vec![1.0, -1.0]));
        assert_eq!(grads.weights.unwrap().data, vec![-2.0, -2.0]);
        assert_eq!(grads.biases.unwrap().data, vec![0.0]);
        assert_eq!(dense.propagate(&grads.delta).data, vec![2.0, -1.0, -2.0, 1.0]);
    }

    #[test]
    fn frozen_layer_yields_no_parameter_gradients() {
        let mut dense = Dense::from_params(
            Param::frozen(Matrix::from_vec(2, 1, vec![2.0, -1.0])),
            Param::frozen(Matrix::from_vec(1, 1, vec![0.5])),
            ActivationFunction::Identity,
        );
        dense.feed_from(Matrix::from_vec(1, 2, vec![1.0, 2.0]));
        let grads = dense.compute_gradients(&Matrix::from_vec(1, 1, vec![1.0]));
        assert!(dense.is_frozen());
        assert!(grads.weights.is_none() && grads.biases.is_none());
    }
}
