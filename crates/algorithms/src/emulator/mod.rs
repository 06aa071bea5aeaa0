//! Gaussian-process emulators of simulation outputs
//!
//! - [`GaussianProcess`]: the regression model shared by both emulators
//! - [`ScalarEmulator`]: one model per scalar output (area, volume, point values)
//! - [`VectorEmulator`]: one multi-output model over the active cells of a field
//! - Metrics: leave-one-out scores and field validation reports

mod gp;
mod linalg;
pub mod metrics;
mod scalar;
mod vector;

pub use gp::{GaussianProcess, GpParams, GpPrediction};
pub use metrics::{LooMetrics, ValidationReport};
pub use scalar::{ScalarEmulator, ScalarPrediction};
pub use vector::VectorEmulator;

use ndarray::ArrayView2;

use flowuq_core::{DesignMatrix, Error, Result};

/// Behaviour shared by emulators trained on a fixed design.
pub trait Emulator {
    /// Inputs the emulator was trained on
    fn design(&self) -> &DesignMatrix;

    fn gp_params(&self) -> &GpParams;

    /// Reject prediction inputs whose column count differs from the
    /// training design.
    fn check_design(&self, design: &DesignMatrix) -> Result<()> {
        let expected = self.design().cols();
        if design.cols() != expected {
            return Err(Error::DimensionMismatch {
                what: "design columns",
                expected,
                actual: design.cols(),
            });
        }
        Ok(())
    }

    /// Fit a model of `response` (one row per training run).
    fn fit(&self, response: ArrayView2<'_, f64>) -> Result<GaussianProcess> {
        let runs = self.design().rows();
        if response.nrows() != runs {
            return Err(Error::DimensionMismatch {
                what: "training runs",
                expected: runs,
                actual: response.nrows(),
            });
        }
        GaussianProcess::fit(self.design().view(), response, self.gp_params())
    }
}
