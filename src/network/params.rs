use std::collections::BTreeMap;
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{CcnnError, Result};
use crate::io::json;
use crate::math::matrix::Matrix;

/// One exported parameter tensor: its logical shape and row-major values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl NamedTensor {
    pub fn from_matrix(shape: Vec<usize>, matrix: &Matrix) -> NamedTensor {
        debug_assert_eq!(shape.iter().product::<usize>(), matrix.data.len());
        NamedTensor { shape, values: matrix.data.clone() }
    }

    /// Views the tensor as a `rows x cols` matrix.
    pub fn to_matrix(&self, rows: usize, cols: usize) -> Matrix {
        Matrix::from_vec(rows, cols, self.values.clone())
    }
}

/// Named parameter tensors, persisted between training stages.
///
/// A bundle written after pretraining is the input of the transfer stage,
/// whose own bundle can feed a further fine-tuning stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamBundle {
    tensors: BTreeMap<String, NamedTensor>,
}

impl ParamBundle {
    pub fn new() -> ParamBundle {
        ParamBundle::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: NamedTensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&NamedTensor> {
        self.tensors.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Looks up `name` and checks it against `expected` (shape and value
    /// count). Fails with `MissingParam` or `ParamShape`.
    pub fn require(&self, name: &str, expected: &[usize]) -> Result<&NamedTensor> {
        let tensor = self
            .get(name)
            .ok_or_else(|| CcnnError::MissingParam(name.to_string()))?;
        if tensor.shape != expected {
            return Err(CcnnError::ParamShape {
                name: name.to_string(),
                expected: expected.to_vec(),
                found: tensor.shape.clone(),
            });
        }
        let count: usize = expected.iter().product();
        if tensor.values.len() != count {
            return Err(CcnnError::ShapeMismatch {
                what: "parameter values",
                expected: format!("{count} values for '{name}'"),
                found: tensor.values.len().to_string(),
            });
        }
        Ok(tensor)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        json::save_json(self, path)
    }

    pub fn load_json(path: &Path) -> Result<ParamBundle> {
        json::load_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> ParamBundle {
        let mut b = ParamBundle::new();
        b.insert("layer4_biases", NamedTensor { shape: vec![1], values: vec![0.01] });
        b.insert("layer4_weights", NamedTensor { shape: vec![2, 1], values: vec![0.5, -0.5] });
        b
    }

    #[test]
    fn require_checks_presence_and_shape() {
        let b = bundle();
        assert!(b.require("layer4_weights", &[2, 1]).is_ok());
        assert!(matches!(b.require("layer4_weights", &[1, 2]), Err(CcnnError::ParamShape { .. })));
        assert!(matches!(b.require("layer3_weights", &[2, 1]), Err(CcnnError::MissingParam(_))));
    }

    #[test]
    fn inconsistent_value_count_is_rejected() {
        let mut b = ParamBundle::new();
        b.insert("layer4_biases", NamedTensor { shape: vec![2], values: vec![0.01] });
        assert!(matches!(b.require("layer4_biases", &[2]), Err(CcnnError::ShapeMismatch { .. })));
    }

    #[test]
    fn survives_a_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        let b = bundle();
        b.save_json(&path).unwrap();
        let loaded = ParamBundle::load_json(&path).unwrap();
        assert_eq!(loaded, b);
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["layer4_biases", "layer4_weights"]);
    }
}
