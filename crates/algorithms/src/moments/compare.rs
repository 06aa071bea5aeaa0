//! Side-by-side comparison of two moment summaries

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use flowuq_core::{Error, Result};

use super::{round_decimals, MomentKind, MomentSummary};
use crate::scalars::ScalarKind;

/// Sign of `mcs − pem`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Greater,
    Less,
    Equal,
    /// Either side is NaN
    Undefined,
}

impl Direction {
    fn of(difference: f64) -> Self {
        if difference > 0.0 {
            Direction::Greater
        } else if difference < 0.0 {
            Direction::Less
        } else if difference == 0.0 {
            Direction::Equal
        } else {
            Direction::Undefined
        }
    }
}

/// One moment of one scalar in one scenario
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentDifference {
    pub difference: f64,
    pub direction: Direction,
}

/// moment → scalar → per-scenario differences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MomentComparison {
    values: BTreeMap<MomentKind, BTreeMap<ScalarKind, Vec<MomentDifference>>>,
}

impl MomentComparison {
    pub fn get(&self, kind: MomentKind, scalar: ScalarKind) -> Option<&[MomentDifference]> {
        self.values
            .get(&kind)
            .and_then(|m| m.get(&scalar))
            .map(Vec::as_slice)
    }
}

/// Difference `mcs − pem` (rounded to three decimals) for every moment,
/// scalar and scenario present in `mcs`.
///
/// # Errors
/// [`Error::InvalidParameter`] if `pem` lacks an entry of `mcs`, and
/// [`Error::DimensionMismatch`] if the scenario counts differ.
pub fn compare(mcs: &MomentSummary, pem: &MomentSummary) -> Result<MomentComparison> {
    let mut out = MomentComparison::default();
    for (kind, scalar, lhs) in mcs.iter() {
        let rhs = pem.get(kind, scalar).ok_or_else(|| {
            Error::invalid("scalar", scalar, format!("no PEM {kind} to compare against"))
        })?;
        if lhs.len() != rhs.len() {
            return Err(Error::DimensionMismatch {
                what: "scenarios",
                expected: lhs.len(),
                actual: rhs.len(),
            });
        }
        let diffs = lhs
            .iter()
            .zip(rhs)
            .map(|(a, b)| {
                let difference = round_decimals(a - b, 3);
                MomentDifference {
                    difference,
                    direction: Direction::of(difference),
                }
            })
            .collect();
        out.values.entry(kind).or_default().insert(scalar, diffs);
    }
    Ok(out)
}
