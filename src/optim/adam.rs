use std::collections::HashMap;

use crate::{layers::param::Param, math::matrix::Matrix};

/// Adaptive Moment Estimation.
///
/// Moments are kept per parameter slot, so one `Adam` must only ever drive
/// one network. Frozen parameters are skipped and get no moment buffers.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    step: u64,
    m: HashMap<usize, Matrix>,
    v: HashMap<usize, Matrix>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Adam {
        Adam::with_betas(learning_rate, 0.9, 0.999)
    }

    pub fn with_betas(learning_rate: f64, beta1: f64, beta2: f64) -> Adam {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon: 1e-8,
            step: 0,
            m: HashMap::new(),
            v: HashMap::new(),
        }
    }

    /// Number of completed optimizer steps.
    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Advances the bias-correction clock. Call once per minibatch, before
    /// the per-parameter `update`s of that batch.
    pub fn begin_step(&mut self) {
        self.step += 1;
    }

    /// Applies one Adam update to the parameter in slot `slot`.
    pub fn update(&mut self, slot: usize, param: &mut Param, grad: &Matrix) {
        if param.frozen {
            return;
        }
        assert!(self.step > 0, "begin_step must be called before update");
        assert_eq!(param.value.data.len(), grad.data.len(), "gradient shape mismatch");

        let len = grad.data.len();
        let m = self.m.entry(slot).or_insert_with(|| Matrix::zeros(1, len));
        let v = self.v.entry(slot).or_insert_with(|| Matrix::zeros(1, len));

        let t = self.step as i32;
        let m_correction = 1.0 - self.beta1.powi(t);
        let v_correction = 1.0 - self.beta2.powi(t);

        for i in 0..len {
            let g = grad.data[i];
            m.data[i] = self.beta1 * m.data[i] + (1.0 - self.beta1) * g;
            v.data[i] = self.beta2 * v.data[i] + (1.0 - self.beta2) * g * g;
            let mt = m.data[i] / m_correction;
            let vt = v.data[i] / v_correction;
            param.value.data[i] -= self.learning_rate * mt / (vt.sqrt() + self.epsilon);
        }
    }
}
