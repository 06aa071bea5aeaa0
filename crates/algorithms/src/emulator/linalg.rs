//! Dense Cholesky factorisation for correlation matrices

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use flowuq_core::{Error, Result};

/// Lower-triangular factor `L` with `A = L·Lᵀ`.
#[derive(Debug, Clone)]
pub(crate) struct Cholesky {
    l: Array2<f64>,
}

impl Cholesky {
    /// Factorise a symmetric positive-definite matrix.
    pub fn decompose(a: &Array2<f64>) -> Result<Self> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(Error::DimensionMismatch {
                what: "square matrix",
                expected: n,
                actual: a.ncols(),
            });
        }

        let mut l = Array2::<f64>::zeros((n, n));
        for j in 0..n {
            let mut diag = a[[j, j]];
            for k in 0..j {
                diag -= l[[j, k]] * l[[j, k]];
            }
            if !(diag > 0.0) || !diag.is_finite() {
                return Err(Error::Algorithm(format!(
                    "correlation matrix is not positive definite (pivot {j})"
                )));
            }
            let d = diag.sqrt();
            l[[j, j]] = d;

            for i in (j + 1)..n {
                let mut sum = a[[i, j]];
                for k in 0..j {
                    sum -= l[[i, k]] * l[[j, k]];
                }
                l[[i, j]] = sum / d;
            }
        }
        Ok(Self { l })
    }

    pub fn dim(&self) -> usize {
        self.l.nrows()
    }

    /// ln |A|
    pub fn log_det(&self) -> f64 {
        2.0 * self.l.diag().iter().map(|d| d.ln()).sum::<f64>()
    }

    /// Solve `L·z = b`
    pub fn forward(&self, b: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = self.dim();
        let mut z = b.to_owned();
        for i in 0..n {
            let mut sum = z[i];
            for k in 0..i {
                sum -= self.l[[i, k]] * z[k];
            }
            z[i] = sum / self.l[[i, i]];
        }
        z
    }

    /// Solve `Lᵀ·x = z`
    fn backward(&self, mut z: Array1<f64>) -> Array1<f64> {
        let n = self.dim();
        for i in (0..n).rev() {
            let mut sum = z[i];
            for k in (i + 1)..n {
                sum -= self.l[[k, i]] * z[k];
            }
            z[i] = sum / self.l[[i, i]];
        }
        z
    }

    /// Solve `A·x = b`
    pub fn solve(&self, b: ArrayView1<'_, f64>) -> Array1<f64> {
        self.backward(self.forward(b))
    }

    /// Solve `L·Z = B` column by column
    pub fn forward_mat(&self, b: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = Array2::zeros(b.raw_dim());
        for (mut dst, src) in out.columns_mut().into_iter().zip(b.columns()) {
            dst.assign(&self.forward(src));
        }
        out
    }

    /// Solve `A·X = B` column by column
    pub fn solve_mat(&self, b: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = Array2::zeros(b.raw_dim());
        for (mut dst, src) in out.columns_mut().into_iter().zip(b.columns()) {
            dst.assign(&self.solve(src));
        }
        out
    }
}
