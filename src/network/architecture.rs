use serde::{Serialize, Deserialize};

use crate::error::{CcnnError, Result};

/// Names of the eight parameter tensors, in layer order.
pub const PARAM_NAMES: [&str; 8] = [
    "layer1_weights",
    "layer1_biases",
    "layer2_weights",
    "layer2_biases",
    "layer3_weights",
    "layer3_biases",
    "layer4_weights",
    "layer4_biases",
];

/// Sizes of the fixed four-layer connectome network.
///
/// Only the widths are configurable; the layer sequence (row convolution,
/// column convolution, hidden dense, scalar output) is not.
///
/// Fields:
/// - `num_roi`     — side length of the square connectivity matrices
/// - `row_maps`    — feature maps of the `1 × num_roi` convolution
/// - `column_maps` — feature maps of the `num_roi × 1` convolution
/// - `hidden`      — units of the fully connected hidden layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Architecture {
    pub num_roi: usize,
    pub row_maps: usize,
    pub column_maps: usize,
    pub hidden: usize,
}

impl Default for Architecture {
    fn default() -> Self {
        Architecture {
            num_roi: 111,
            row_maps: 64,
            column_maps: 256,
            hidden: 96,
        }
    }
}

impl Architecture {
    /// Values per instance (`num_roi²`, one channel).
    pub fn input_len(&self) -> usize {
        self.num_roi * self.num_roi
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_roi == 0 || self.row_maps == 0 || self.column_maps == 0 || self.hidden == 0 {
            return Err(CcnnError::InvalidConfig(format!(
                "all architecture sizes must be positive, got {:?}",
                self
            )));
        }
        Ok(())
    }

    /// Exported shape of every parameter tensor, keyed by `PARAM_NAMES`.
    pub fn param_shapes(&self) -> [(&'static str, Vec<usize>); 8] {
        let r = self.num_roi;
        [
            (PARAM_NAMES[0], vec![1, r, 1, self.row_maps]),
            (PARAM_NAMES[1], vec![self.row_maps]),
            (PARAM_NAMES[2], vec![r, 1, self.row_maps, self.column_maps]),
            (PARAM_NAMES[3], vec![self.column_maps]),
            (PARAM_NAMES[4], vec![self.column_maps, self.hidden]),
            (PARAM_NAMES[5], vec![self.hidden]),
            (PARAM_NAMES[6], vec![self.hidden, 1]),
            (PARAM_NAMES[7], vec![1]),
        ]
    }

    pub fn param_shape(&self, name: &str) -> Option<Vec<usize>> {
        self.param_shapes()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, shape)| shape)
    }
}
