//! Error and coverage metrics for emulator predictions

use ndarray::{Array2, ArrayView1, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use flowuq_core::{Error, Result};

/// Coefficient of determination.
///
/// With a constant truth the score is 1 for a perfect prediction and 0
/// otherwise.
pub fn r2_score(truth: ArrayView1<'_, f64>, pred: ArrayView1<'_, f64>) -> f64 {
    let n = truth.len() as f64;
    let mean = truth.sum() / n;
    let ss_res: f64 = Zip::from(&truth)
        .and(&pred)
        .fold(0.0, |acc, &t, &p| acc + (t - p).powi(2));
    let ss_tot: f64 = truth.iter().map(|&t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Mean absolute percentage error as a fraction (0.05 = 5 %).
///
/// Zero truths are guarded with `f64::EPSILON` in the denominator.
pub fn mean_absolute_percentage_error(truth: ArrayView1<'_, f64>, pred: ArrayView1<'_, f64>) -> f64 {
    let total = Zip::from(&truth)
        .and(&pred)
        .fold(0.0, |acc, &t, &p| acc + (t - p).abs() / t.abs().max(f64::EPSILON));
    total / truth.len() as f64
}

/// Mean squared error over all elements
pub fn mean_squared_error<'a, 'b, D>(
    truth: ndarray::ArrayView<'a, f64, D>,
    pred: ndarray::ArrayView<'b, f64, D>,
) -> f64
where
    D: ndarray::Dimension,
{
    let total = Zip::from(&truth)
        .and(&pred)
        .fold(0.0, |acc, &t, &p| acc + (t - p).powi(2));
    total / truth.len() as f64
}

/// Leave-one-out accuracy of a scalar emulator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LooMetrics {
    /// Coefficient of determination
    pub r2: f64,
    /// Mean absolute percentage error, in percent
    pub mape: f64,
    /// Root-mean-square error as a percentage of the mean truth
    pub nrmse: f64,
}

impl LooMetrics {
    pub fn compute(truth: ArrayView1<'_, f64>, pred: ArrayView1<'_, f64>) -> Result<Self> {
        check_len(truth.len(), pred.len())?;
        if truth.is_empty() {
            return Err(Error::Algorithm("no predictions to score".into()));
        }
        let mean = truth.sum() / truth.len() as f64;
        Ok(Self {
            r2: r2_score(truth, pred),
            mape: 100.0 * mean_absolute_percentage_error(truth, pred),
            nrmse: 100.0 * mean_squared_error(truth, pred).sqrt() / mean,
        })
    }
}

/// Out-of-sample accuracy of a field emulator
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Predictive mean with negative values clipped to zero (m × k)
    #[serde(skip)]
    pub validation: Array2<f64>,
    /// Fraction of validation values inside the clipped 95 % interval
    pub pci95: f64,
    /// Mean width of the clipped 95 % interval
    pub lci95: f64,
    /// Mean squared error of the clipped mean
    pub mean_sq_err: f64,
}

impl ValidationReport {
    /// Score clipped predictions against `truth`; all arrays are m × k.
    pub fn compute(
        truth: ArrayView2<'_, f64>,
        mean: ArrayView2<'_, f64>,
        lower: ArrayView2<'_, f64>,
        upper: ArrayView2<'_, f64>,
    ) -> Result<Self> {
        for other in [mean.dim(), lower.dim(), upper.dim()] {
            if other != truth.dim() {
                return Err(Error::SizeMismatch {
                    er: truth.nrows(),
                    ec: truth.ncols(),
                    ar: other.0,
                    ac: other.1,
                });
            }
        }
        if truth.is_empty() {
            return Err(Error::Algorithm("no validation values to score".into()));
        }

        let validation = clip(mean);
        let lower = clip(lower);
        let upper = clip(upper);
        let count = truth.len() as f64;

        let inside = Zip::from(&truth)
            .and(&lower)
            .and(&upper)
            .fold(0usize, |acc, &t, &lo, &hi| acc + usize::from(t >= lo && t <= hi));
        let width = (&upper - &lower).sum();

        Ok(Self {
            pci95: inside as f64 / count,
            lci95: width / count,
            mean_sq_err: mean_squared_error(validation.view(), truth),
            validation,
        })
    }
}

fn clip(a: ArrayView2<'_, f64>) -> Array2<f64> {
    a.mapv(|v| if v < 0.0 { 0.0 } else { v })
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::DimensionMismatch {
            what: "prediction length",
            expected,
            actual,
        });
    }
    Ok(())
}
