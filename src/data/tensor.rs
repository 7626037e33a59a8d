use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Deserialize};

use crate::error::{CcnnError, Result};
use crate::math::matrix::Matrix;

/// Identifier of the subject a scan belongs to. Several instances may share
/// one subject; folds are always built over subjects, never over instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stack of square single-channel connectivity matrices,
/// shape `[len, side, side, 1]`, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnTensor {
    side: usize,
    data: Vec<f64>,
}

impl ConnTensor {
    pub fn new(len: usize, side: usize, data: Vec<f64>) -> Result<ConnTensor> {
        if data.len() != len * side * side {
            return Err(CcnnError::ShapeMismatch {
                what: "instance tensor",
                expected: format!("{len} x {side} x {side} = {} values", len * side * side),
                found: data.len().to_string(),
            });
        }
        Ok(ConnTensor { side, data })
    }

    pub fn len(&self) -> usize {
        match self.instance_len() {
            0 => 0,
            n => self.data.len() / n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn instance_len(&self) -> usize {
        self.side * self.side
    }

    pub fn instance(&self, i: usize) -> &[f64] {
        let n = self.instance_len();
        &self.data[i * n..(i + 1) * n]
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// New tensor holding the instances at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> ConnTensor {
        let mut data = Vec::with_capacity(indices.len() * self.instance_len());
        for &i in indices {
            data.extend_from_slice(self.instance(i));
        }
        ConnTensor { side: self.side, data }
    }

    /// Keeps the top-left `side x side` block of every matrix.
    pub fn crop(&self, side: usize) -> Result<ConnTensor> {
        if side > self.side {
            return Err(CcnnError::ShapeMismatch {
                what: "matrix side",
                expected: format!("at least {side}"),
                found: self.side.to_string(),
            });
        }
        if side == self.side {
            return Ok(self.clone());
        }
        let mut data = Vec::with_capacity(self.len() * side * side);
        for i in 0..self.len() {
            let m = self.instance(i);
            for r in 0..side {
                data.extend_from_slice(&m[r * self.side..r * self.side + side]);
            }
        }
        Ok(ConnTensor { side, data })
    }

    /// Instances `start..start + count` as a `[count, side²]` matrix.
    pub fn rows(&self, start: usize, count: usize) -> Matrix {
        let n = self.instance_len();
        Matrix::from_vec(count, n, self.data[start * n..(start + count) * n].to_vec())
    }

    /// The whole tensor as a `[len, side²]` matrix.
    pub fn to_matrix(&self) -> Matrix {
        self.rows(0, self.len())
    }
}

/// Instances with their labels; the unit the training loop iterates over.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    pub data: ConnTensor,
    pub labels: Vec<f64>,
}

impl Samples {
    pub fn new(data: ConnTensor, labels: Vec<f64>) -> Result<Samples> {
        if data.len() != labels.len() {
            return Err(CcnnError::ShapeMismatch {
                what: "labels",
                expected: format!("{} labels (one per instance)", data.len()),
                found: labels.len().to_string(),
            });
        }
        Ok(Samples { data, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn select(&self, indices: &[usize]) -> Samples {
        Samples {
            data: self.data.select(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// The full experiment input: every instance, its label and its subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub samples: Samples,
    pub subjects: Vec<SubjectId>,
}

impl Dataset {
    pub fn new(data: ConnTensor, labels: Vec<f64>, subjects: Vec<SubjectId>) -> Result<Dataset> {
        let samples = Samples::new(data, labels)?;
        if subjects.len() != samples.len() {
            return Err(CcnnError::ShapeMismatch {
                what: "subject ids",
                expected: format!("{} subject ids (one per instance)", samples.len()),
                found: subjects.len().to_string(),
            });
        }
        Ok(Dataset { samples, subjects })
    }

    /// Dataset where every instance is its own subject, numbered from 1.
    /// Used for data without subject information (full-data pretraining).
    pub fn without_subjects(data: ConnTensor, labels: Vec<f64>) -> Result<Dataset> {
        let subjects = (1..=labels.len() as u64).map(SubjectId).collect();
        Dataset::new(data, labels, subjects)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn side(&self) -> usize {
        self.samples.data.side()
    }

    pub fn unique_subjects(&self) -> usize {
        self.subjects.iter().collect::<HashSet<_>>().len()
    }
}
