use rand::Rng;
use serde::{Serialize, Deserialize};

/// Dense row-major matrix of `f64`.
///
/// Activations are stored one sample (or one matrix row, for the row
/// convolution) per matrix row, so a batch is always `[batch, features]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Wraps an existing buffer. Panics if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Matrix {
        assert_eq!(
            data.len(),
            rows * cols,
            "buffer of {} values cannot back a {}x{} matrix",
            data.len(),
            rows,
            cols
        );
        Matrix { rows, cols, data }
    }

    /// Xavier (Glorot) uniform initialization: samples from
    /// U(-limit, limit) with `limit = sqrt(6 / (fan_in + fan_out))`.
    ///
    /// The fans are passed explicitly because a convolution kernel stored as
    /// a matrix has a receptive field that differs from its matrix shape.
    pub fn glorot_uniform<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) -> Matrix {
        let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let data = (0..rows * cols)
            .map(|_| rng.gen_range(-limit..=limit))
            .collect();
        Matrix { rows, cols, data }
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Same buffer, new shape. Panics if the element count changes.
    pub fn reshape(self, rows: usize, cols: usize) -> Matrix {
        Matrix::from_vec(rows, cols, self.data)
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// `self * rhs`
    pub fn matmul(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(self.cols, rhs.rows, "Matrices are of incorrect sizes");
        let n = rhs.cols;
        let mut res = Matrix::zeros(self.rows, n);
        for i in 0..self.rows {
            let out_row = &mut res.data[i * n..(i + 1) * n];
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                if a == 0.0 {
                    continue;
                }
                let rhs_row = &rhs.data[k * n..(k + 1) * n];
                for (o, b) in out_row.iter_mut().zip(rhs_row) {
                    *o += a * b;
                }
            }
        }
        res
    }

    /// `selfᵀ * rhs` without materializing the transpose.
    pub fn t_matmul(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(self.rows, rhs.rows, "Matrices are of incorrect sizes");
        let n = rhs.cols;
        let mut res = Matrix::zeros(self.cols, n);
        for r in 0..self.rows {
            let rhs_row = &rhs.data[r * n..(r + 1) * n];
            for i in 0..self.cols {
                let a = self.data[r * self.cols + i];
                if a == 0.0 {
                    continue;
                }
                let out_row = &mut res.data[i * n..(i + 1) * n];
                for (o, b) in out_row.iter_mut().zip(rhs_row) {
                    *o += a * b;
                }
            }
        }
        res
    }

    /// `self * rhsᵀ` without materializing the transpose.
    pub fn matmul_t(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(self.cols, rhs.cols, "Matrices are of incorrect sizes");
        let mut res = Matrix::zeros(self.rows, rhs.rows);
        for i in 0..self.rows {
            let a = self.row(i);
            for j in 0..rhs.rows {
                res.data[i * rhs.rows + j] = a.iter().zip(rhs.row(j)).map(|(x, y)| x * y).sum();
            }
        }
        res
    }

    /// Adds `bias` to every row.
    pub fn add_row_vector(&mut self, bias: &Matrix) {
        assert_eq!(bias.data.len(), self.cols, "bias length must equal column count");
        for row in self.data.chunks_mut(self.cols) {
            for (x, b) in row.iter_mut().zip(&bias.data) {
                *x += b;
            }
        }
    }

    /// Sums over rows, returned as a `1 x cols` matrix.
    pub fn column_sums(&self) -> Matrix {
        let mut res = Matrix::zeros(1, self.cols);
        for row in self.data.chunks(self.cols) {
            for (s, x) in res.data.iter_mut().zip(row) {
                *s += x;
            }
        }
        res
    }
}

/// Element-wise (Hadamard) product of two same-shape matrices.
pub fn hadamard(a: &Matrix, b: &Matrix) -> Matrix {
    assert_eq!(a.rows, b.rows);
    assert_eq!(a.cols, b.cols);
    let data = a.data.iter().zip(&b.data).map(|(x, y)| x * y).collect();
    Matrix::from_vec(a.rows, a.cols, data)
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}
