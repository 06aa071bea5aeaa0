//! Statistical moments of uncertain outputs
//!
//! Two propagation methods are compared per coefficient-of-variation (COV)
//! scenario:
//! - MCS: Monte Carlo samples pushed through a trained scalar emulator
//! - PEM: point-estimate runs of the simulator itself, eight per scenario
//!
//! Both produce a [`MomentSummary`] of mean, sample variance and skewness,
//! rounded to three decimals.

mod compare;
mod mcs;
mod pem;

pub use compare::{compare, Direction, MomentComparison, MomentDifference};
pub use mcs::{compute_mcs_moments, load_mcs_inputs};
pub use pem::{compute_pem_moments, compute_pem_moments_with, pem_field_moments, PemLayout};

use std::collections::BTreeMap;
use std::fmt;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::scalars::ScalarKind;

/// Input COV of each scenario, in scenario order
pub const COV_SCENARIOS: [f64; 3] = [0.10, 0.25, 0.50];

/// Moment computed per scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MomentKind {
    Mean,
    Var,
    Skew,
}

impl MomentKind {
    pub const ALL: [MomentKind; 3] = [MomentKind::Mean, MomentKind::Var, MomentKind::Skew];

    pub fn as_str(&self) -> &'static str {
        match self {
            MomentKind::Mean => "mean",
            MomentKind::Var => "var",
            MomentKind::Skew => "skew",
        }
    }

    /// Unrounded moment of `values`
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        match self {
            MomentKind::Mean => mean(values),
            MomentKind::Var => sample_variance(values),
            MomentKind::Skew => skewness(values),
        }
    }
}

impl fmt::Display for MomentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// moment → scalar → one value per scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MomentSummary {
    values: BTreeMap<MomentKind, BTreeMap<ScalarKind, Vec<f64>>>,
}

impl MomentSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the rounded moments of one scenario's `samples`.
    pub fn push_scenario(&mut self, scalar: ScalarKind, samples: &[f64]) {
        for kind in MomentKind::ALL {
            self.values
                .entry(kind)
                .or_default()
                .entry(scalar)
                .or_default()
                .push(round_decimals(kind.evaluate(samples), 3));
        }
    }

    pub fn get(&self, kind: MomentKind, scalar: ScalarKind) -> Option<&[f64]> {
        self.values
            .get(&kind)
            .and_then(|m| m.get(&scalar))
            .map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MomentKind, ScalarKind, &[f64])> {
        self.values.iter().flat_map(|(&kind, by_scalar)| {
            by_scalar
                .iter()
                .map(move |(&scalar, v)| (kind, scalar, v.as_slice()))
        })
    }

    /// Scalars present, in order
    pub fn scalars(&self) -> Vec<ScalarKind> {
        self.values
            .values()
            .next()
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }
}

/// Round half to even at `decimals` places; NaN stays NaN.
pub fn round_decimals(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round_ties_even() / scale
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    ArrayView1::from(values).mean().unwrap_or(f64::NAN)
}

/// Variance with n − 1 in the denominator (NaN below two samples)
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    ArrayView1::from(values).var(1.0)
}

/// Biased skewness m₃ / m₂^1.5 from population central moments.
///
/// NaN when the data are constant to working precision.
pub(crate) fn skewness(values: &[f64]) -> f64 {
    let view = ArrayView1::from(values);
    let Some(mu) = view.mean() else {
        return f64::NAN;
    };
    let dev = view.mapv(|v| v - mu);
    let m2 = dev.mapv(|d| d * d).mean().unwrap_or(f64::NAN);
    if m2 <= (f64::EPSILON * mu).powi(2) {
        return f64::NAN;
    }
    let m3 = dev.mapv(|d| d * d * d).mean().unwrap_or(f64::NAN);
    m3 / m2.powf(1.5)
}
