//! Lateral spread of a flow footprint

use ndarray::Axis;
use serde::{Deserialize, Serialize};

use flowuq_core::{RasterStack, Result};

use super::Threshold;

/// Widest north–south cross-section of one band's footprint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LateralSpread {
    /// Position of the widest column among the band's active columns
    /// (west to east), times the resolution. Inactive columns do not count.
    pub location: f64,
    /// Extent of the widest column (active cells × resolution)
    pub value: f64,
}

/// For every band, find the column holding the most active cells.
///
/// Cells below `threshold` (and zero cells) are ignored. Ties go to the
/// westernmost column; a band with no active cell gives zeros.
pub fn lateral_spread(stack: &RasterStack, threshold: f64) -> Result<Vec<LateralSpread>> {
    let threshold = Threshold::new(threshold)?;
    let res = stack.resolution();

    Ok(stack
        .bands()
        .map(|band| {
            let mut best: Option<(usize, usize)> = None;
            let active_columns = band
                .axis_iter(Axis(1))
                .map(|column| {
                    column
                        .iter()
                        .filter(|&&v| threshold.admits(v) && v != 0.0)
                        .count()
                })
                .filter(|&n| n > 0);
            for (rank, active) in active_columns.enumerate() {
                if best.is_none_or(|(_, n)| active > n) {
                    best = Some((rank, active));
                }
            }
            match best {
                Some((rank, count)) => LateralSpread {
                    location: rank as f64 * res,
                    value: count as f64 * res,
                },
                None => LateralSpread { location: 0.0, value: 0.0 },
            }
        })
        .collect())
}
