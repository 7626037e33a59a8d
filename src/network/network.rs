use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{
    activation::activation::ActivationFunction,
    error::Result,
    layers::{
        conv::{ColumnConv, RowConv},
        dense::{Dense, LayerGradients},
        dropout::{apply_mask, DropoutMask},
        param::Param,
    },
    math::matrix::Matrix,
    network::{
        architecture::Architecture,
        params::{NamedTensor, ParamBundle},
    },
    optim::adam::Adam,
};

const DENSE_BIAS_INIT: f64 = 0.01;

/// How the parameters of a fresh network are obtained.
#[derive(Debug, Clone)]
pub enum Initialization {
    /// Every layer trainable, Xavier-initialized.
    Xavier,
    /// Layers 1–2 loaded from the bundle and frozen; layers 3–4 fresh.
    Transfer(ParamBundle),
    /// Layers 1–2 loaded and frozen; layers 3–4 start from the bundle's
    /// values and stay trainable. Continues a previous transfer stage.
    FineTune(ParamBundle),
}

/// Which tensors `export` writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportScope {
    #[default]
    All,
    Trainable,
}

/// Output of a training-mode forward pass, with the dropout masks that the
/// backward pass has to reuse.
#[derive(Debug)]
pub struct ForwardPass {
    pub outputs: Matrix,
    masks: [Option<DropoutMask>; 3],
}

impl ForwardPass {
    pub fn predictions(&self) -> Vec<f64> {
        self.outputs.data.clone()
    }
}

/// Per-layer gradients, input layer first. A `None` entry is a layer the
/// backward pass never reached because nothing below it is trainable.
#[derive(Debug)]
pub struct NetGradients {
    pub layers: [Option<LayerGradients>; 4],
}

/// Row convolution → column convolution → dense → scalar output.
#[derive(Debug)]
pub struct ConnectomeNet {
    pub arch: Architecture,
    pub row_conv: RowConv,
    pub column_conv: ColumnConv,
    pub hidden: Dense,
    pub output: Dense,
}

impl ConnectomeNet {
    pub fn new<R: Rng + ?Sized>(arch: Architecture, init: &Initialization, rng: &mut R) -> Result<ConnectomeNet> {
        match init {
            Initialization::Xavier => ConnectomeNet::xavier(arch, rng),
            Initialization::Transfer(bundle) => ConnectomeNet::from_pretrained(arch, bundle, rng),
            Initialization::FineTune(bundle) => ConnectomeNet::fine_tune(arch, bundle),
        }
    }

    pub fn xavier<R: Rng + ?Sized>(arch: Architecture, rng: &mut R) -> Result<ConnectomeNet> {
        arch.validate()?;
        let row_conv = RowConv::new(arch.num_roi, arch.row_maps, rng);
        let column_conv = ColumnConv::new(arch.num_roi, arch.row_maps, arch.column_maps, rng);
        let (hidden, output) = fresh_dense_layers(&arch, rng);
        Ok(ConnectomeNet { arch, row_conv, column_conv, hidden, output })
    }

    /// Pretrained convolutions as constants plus freshly initialized
    /// fully connected layers.
    pub fn from_pretrained<R: Rng + ?Sized>(
        arch: Architecture,
        bundle: &ParamBundle,
        rng: &mut R,
    ) -> Result<ConnectomeNet> {
        arch.validate()?;
        let (row_conv, column_conv) = frozen_convolutions(&arch, bundle)?;
        let (hidden, output) = fresh_dense_layers(&arch, rng);
        Ok(ConnectomeNet { arch, row_conv, column_conv, hidden, output })
    }

    pub fn fine_tune(arch: Architecture, bundle: &ParamBundle) -> Result<ConnectomeNet> {
        arch.validate()?;
        let (row_conv, column_conv) = frozen_convolutions(&arch, bundle)?;
        let hidden = load_dense(&arch, bundle, 4, ActivationFunction::ReLU, false)?;
        let output = load_dense(&arch, bundle, 6, ActivationFunction::Identity, false)?;
        Ok(ConnectomeNet { arch, row_conv, column_conv, hidden, output })
    }

    /// Training-mode forward pass over a `[batch, num_roi²]` matrix, with
    /// dropout after each of the three hidden layers.
    pub fn feed_forward<R: Rng + ?Sized>(
        &mut self,
        inputs: &Matrix,
        keep_probability: f64,
        rng: &mut R,
    ) -> ForwardPass {
        let n = inputs.rows;

        let a1 = self.row_conv.feed_from(inputs);
        let m1 = DropoutMask::sample(n, a1.cols, keep_probability, rng);
        let h1 = apply_mask(m1.as_ref(), a1);

        let a2 = self.column_conv.feed_from(h1);
        let m2 = DropoutMask::sample(n, a2.cols, keep_probability, rng);
        let h2 = apply_mask(m2.as_ref(), a2);

        let a3 = self.hidden.feed_from(h2);
        let m3 = DropoutMask::sample(n, a3.cols, keep_probability, rng);
        let h3 = apply_mask(m3.as_ref(), a3);

        let outputs = self.output.feed_from(h3);
        ForwardPass { outputs, masks: [m1, m2, m3] }
    }

    /// Evaluation forward pass: no dropout, no cached state.
    pub fn predict(&self, inputs: &Matrix) -> Vec<f64> {
        let h1 = self.row_conv.infer(inputs);
        let h2 = self.column_conv.infer(&h1);
        let h3 = self.hidden.infer(&h2);
        self.output.infer(&h3).data
    }

    /// Index of the lowest layer with a trainable parameter, if any.
    fn lowest_trainable(&self) -> Option<usize> {
        [
            self.row_conv.dense.is_frozen(),
            self.column_conv.dense.is_frozen(),
            self.hidden.is_frozen(),
            self.output.is_frozen(),
        ]
        .iter()
        .position(|frozen| !frozen)
    }

    /// Backpropagates ∂L/∂output for the batch of the last `feed_forward`.
    pub fn backward(&self, pass: &ForwardPass, output_grad: &Matrix) -> NetGradients {
        let mut layers: [Option<LayerGradients>; 4] = [None, None, None, None];
        let Some(lowest) = self.lowest_trainable() else {
            return NetGradients { layers };
        };

        let g4 = self.output.compute_gradients(output_grad);
        if lowest <= 2 {
            let grad = apply_mask(pass.masks[2].as_ref(), self.output.propagate(&g4.delta));
            let g3 = self.hidden.compute_gradients(&grad);
            if lowest <= 1 {
                let grad = apply_mask(pass.masks[1].as_ref(), self.hidden.propagate(&g3.delta));
                let g2 = self.column_conv.compute_gradients(&grad);
                if lowest == 0 {
                    let grad = apply_mask(pass.masks[0].as_ref(), self.column_conv.propagate(&g2.delta));
                    layers[0] = Some(self.row_conv.compute_gradients(&grad));
                }
                layers[1] = Some(g2);
            }
            layers[2] = Some(g3);
        }
        layers[3] = Some(g4);
        NetGradients { layers }
    }

    /// One optimizer step over every trainable parameter.
    pub fn apply_gradients(&mut self, grads: &NetGradients, optimizer: &mut Adam) {
        optimizer.begin_step();
        for (i, layer) in self.layers_mut().into_iter().enumerate() {
            let Some(g) = &grads.layers[i] else { continue };
            if let Some(w) = &g.weights {
                optimizer.update(2 * i, &mut layer.weights, w);
            }
            if let Some(b) = &g.biases {
                optimizer.update(2 * i + 1, &mut layer.biases, b);
            }
        }
    }

    fn layers(&self) -> [&Dense; 4] {
        [&self.row_conv.dense, &self.column_conv.dense, &self.hidden, &self.output]
    }

    fn layers_mut(&mut self) -> [&mut Dense; 4] {
        [&mut self.row_conv.dense, &mut self.column_conv.dense, &mut self.hidden, &mut self.output]
    }

    /// All eight parameters in `PARAM_NAMES` order.
    pub fn params(&self) -> [&Param; 8] {
        let [l1, l2, l3, l4] = self.layers();
        [&l1.weights, &l1.biases, &l2.weights, &l2.biases, &l3.weights, &l3.biases, &l4.weights, &l4.biases]
    }

    pub fn trainable_param_count(&self) -> usize {
        self.params()
            .iter()
            .filter(|p| !p.frozen)
            .map(|p| p.value.data.len())
            .sum()
    }

    /// Parameters as a named bundle, in the exported tensor shapes.
    pub fn export(&self, scope: ExportScope) -> ParamBundle {
        let mut bundle = ParamBundle::new();
        for ((name, shape), param) in self.arch.param_shapes().into_iter().zip(self.params()) {
            if scope == ExportScope::Trainable && param.frozen {
                continue;
            }
            bundle.insert(name, NamedTensor::from_matrix(shape, &param.value));
        }
        bundle
    }
}

fn fresh_dense_layers<R: Rng + ?Sized>(arch: &Architecture, rng: &mut R) -> (Dense, Dense) {
    let hidden = Dense::new(
        arch.column_maps,
        arch.hidden,
        ActivationFunction::ReLU,
        DENSE_BIAS_INIT,
        (arch.column_maps, arch.hidden),
        rng,
    );
    let output = Dense::new(arch.hidden, 1, ActivationFunction::Identity, DENSE_BIAS_INIT, (arch.hidden, 1), rng);
    (hidden, output)
}

fn frozen_convolutions(arch: &Architecture, bundle: &ParamBundle) -> Result<(RowConv, ColumnConv)> {
    let row = load_dense(arch, bundle, 0, ActivationFunction::ReLU, true)?;
    let column = load_dense(arch, bundle, 2, ActivationFunction::ReLU, true)?;
    Ok((
        RowConv::from_dense(row, arch.num_roi),
        ColumnConv::from_dense(column, arch.num_roi, arch.row_maps),
    ))
}

/// Builds the layer whose weights are `PARAM_NAMES[first]` and biases
/// `PARAM_NAMES[first + 1]`, checked against the architecture.
fn load_dense(
    arch: &Architecture,
    bundle: &ParamBundle,
    first: usize,
    activation: ActivationFunction,
    frozen: bool,
) -> Result<Dense> {
    let shapes = arch.param_shapes();
    let (w_name, w_shape) = &shapes[first];
    let (b_name, b_shape) = &shapes[first + 1];
    let weights = bundle.require(w_name, w_shape)?;
    let biases = bundle.require(b_name, b_shape)?;

    let size = b_shape[0];
    let input_size = weights.values.len() / size;
    let wrap: fn(Matrix) -> Param = if frozen { Param::frozen } else { Param::trainable };
    Ok(Dense::from_params(
        wrap(weights.to_matrix(input_size, size)),
        wrap(biases.to_matrix(1, size)),
        activation,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::mse::MseLoss;
    use rand::{rngs::StdRng, SeedableRng};

    fn tiny() -> Architecture {
        Architecture { num_roi: 3, row_maps: 2, column_maps: 4, hidden: 3 }
    }

    fn batch(n: usize, arch: &Architecture, rng: &mut StdRng) -> Matrix {
        let data = (0..n * arch.input_len()).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Matrix::from_vec(n, arch.input_len(), data)
    }

    fn batch_loss(net: &ConnectomeNet, inputs: &Matrix, labels: &[f64]) -> f64 {
        MseLoss::loss(&net.predict(inputs), labels)
    }

    #[test]
    fn output_has_one_value_per_instance() {
        let mut rng = StdRng::seed_from_u64(5);
        let net = ConnectomeNet::xavier(tiny(), &mut rng).unwrap();
        let x = batch(4, &tiny(), &mut rng);
        assert_eq!(net.predict(&x).len(), 4);
    }

    #[test]
    fn analytic_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(11);
        let arch = tiny();
        let mut net = ConnectomeNet::xavier(arch, &mut rng).unwrap();
        let x = batch(2, &arch, &mut rng);
        let y = [0.7, -0.3];

        let pass = net.feed_forward(&x, 1.0, &mut rng);
        let out_grad = Matrix::from_vec(2, 1, MseLoss::derivative(&pass.predictions(), &y));
        let grads = net.backward(&pass, &out_grad);

        let eps = 1e-6;
        // weights of every layer, a few entries each
        for layer in 0..4 {
            let analytic = grads.layers[layer].as_ref().unwrap().weights.clone().unwrap();
            for idx in [0, analytic.data.len() / 2, analytic.data.len() - 1] {
                let original = net.layers()[layer].weights.value.data[idx];
                net.layers_mut()[layer].weights.value.data[idx] = original + eps;
                let plus = batch_loss(&net, &x, &y);
                net.layers_mut()[layer].weights.value.data[idx] = original - eps;
                let minus = batch_loss(&net, &x, &y);
                net.layers_mut()[layer].weights.value.data[idx] = original;

                let numeric = (plus - minus) / (2.0 * eps);
                assert!(
                    (numeric - analytic.data[idx]).abs() < 1e-5,
                    "layer {layer} idx {idx}: numeric {numeric} vs analytic {}",
                    analytic.data[idx]
                );
            }
        }
    }

    #[test]
    fn transfer_net_freezes_convolutions() {
        let mut rng = StdRng::seed_from_u64(2);
        let arch = tiny();
        let source = ConnectomeNet::xavier(arch, &mut rng).unwrap();
        let bundle = source.export(ExportScope::All);
        assert_eq!(bundle.len(), 8);

        let mut net = ConnectomeNet::from_pretrained(arch, &bundle, &mut rng).unwrap();
        assert!(net.row_conv.dense.is_frozen() && net.column_conv.dense.is_frozen());
        assert_eq!(net.row_conv.dense.weights.value, source.row_conv.dense.weights.value);

        let x = batch(3, &arch, &mut rng);
        let pass = net.feed_forward(&x, 1.0, &mut rng);
        let grads = net.backward(&pass, &Matrix::filled(3, 1, 1.0));
        assert!(grads.layers[0].is_none() && grads.layers[1].is_none());
        assert!(grads.layers[2].is_some() && grads.layers[3].is_some());

        let hidden_before = net.hidden.weights.value.clone();
        let mut adam = Adam::new(0.01);
        net.apply_gradients(&grads, &mut adam);
        assert_eq!(net.column_conv.dense.weights.value, source.column_conv.dense.weights.value);
        assert_ne!(net.hidden.weights.value, hidden_before);

        let exported = net.export(ExportScope::Trainable);
        assert_eq!(
            exported.names().collect::<Vec<_>>(),
            vec!["layer3_biases", "layer3_weights", "layer4_biases", "layer4_weights"]
        );
    }

    #[test]
    fn pretrained_bundle_with_wrong_side_is_rejected() {
        let mut rng = StdRng::seed_from_u64(2);
        let bundle = ConnectomeNet::xavier(tiny(), &mut rng).unwrap().export(ExportScope::All);
        let bigger = Architecture { num_roi: 4, ..tiny() };
        let err = ConnectomeNet::from_pretrained(bigger, &bundle, &mut rng).unwrap_err();
        assert!(matches!(err, crate::error::CcnnError::ParamShape { .. }));
    }

    #[test]
    fn fine_tune_restores_every_layer() {
        let mut rng = StdRng::seed_from_u64(9);
        let source = ConnectomeNet::xavier(tiny(), &mut rng).unwrap();
        let net = ConnectomeNet::fine_tune(tiny(), &source.export(ExportScope::All)).unwrap();
        let x = batch(2, &tiny(), &mut rng);
        assert_eq!(net.predict(&x), source.predict(&x));
        assert_eq!(net.trainable_param_count(), 4 * 3 + 3 + 3 + 1);
    }
}
