//! Feature extraction from simulation stacks
//!
//! Every function here takes a [`RasterStack`] with one band per simulation
//! run and returns one value (or one row) per band, in band order:
//! - Area: impacted / deposit area in km² above a threshold
//! - Volume: deposit volume in 10⁶ m³ above a threshold
//! - Point: the band values at a map coordinate
//! - Mask: per-cell activation counts and the flattened active cells
//! - Lateral spread: widest active cross-section per band
//!
//! [`RasterStack`]: flowuq_core::RasterStack

mod area;
mod lateral;
mod mask;
mod point;

pub use area::{compute_area, compute_volume};
pub use lateral::{lateral_spread, LateralSpread};
pub use mask::{flatten_with_mask, FieldStatistics, FlattenedStack, ValidColumnMask};
pub use point::extract_point;

use flowuq_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Square metres per square kilometre
pub(crate) const M2_PER_KM2: f64 = 1.0e6;

/// Cut-off above which a cell counts as impacted.
///
/// Always finite and non-negative; comparisons against it are inclusive
/// (`value >= threshold`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::invalid("threshold", value, "threshold must be a number"));
        }
        if value < 0.0 {
            return Err(Error::invalid("threshold", value, "threshold cannot be negative"));
        }
        Ok(Self(value))
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether a cell value is at or above the cut-off (NaN never is).
    #[inline]
    pub fn admits(self, v: f64) -> bool {
        v >= self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(flowuq_core::catalog::DEFAULT_THRESHOLD)
    }
}

impl TryFrom<f64> for Threshold {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Threshold::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(t: Threshold) -> f64 {
        t.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_validation() {
        assert!(Threshold::new(0.0).is_ok());
        assert!(matches!(Threshold::new(-1.0), Err(Error::InvalidParameter { .. })));
        assert!(Threshold::new(f64::NAN).is_err());
        assert!(Threshold::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let t = Threshold::new(0.1).unwrap();
        assert!(t.admits(0.1));
        assert!(!t.admits(0.099));
        assert!(!t.admits(f64::NAN));
    }

    #[test]
    fn test_threshold_serde_rejects_negative() {
        let t: Threshold = serde_json::from_str("0.25").unwrap();
        assert_eq!(t.value(), 0.25);
        assert!(serde_json::from_str::<Threshold>("-0.5").is_err());
    }
}
