//! Point-estimate-method moments

use ndarray::{ArrayView2, Axis};

use flowuq_core::{Error, GeoTransform, Result};

use super::{MomentSummary, COV_SCENARIOS};
use crate::features::{FieldStatistics, ValidColumnMask};
use crate::scalars::ScalarFeatureTable;

/// Arrangement of PEM runs: contiguous blocks, one per scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PemLayout {
    pub scenarios: usize,
    pub points_per_scenario: usize,
}

impl Default for PemLayout {
    fn default() -> Self {
        Self {
            scenarios: COV_SCENARIOS.len(),
            points_per_scenario: 8,
        }
    }
}

impl PemLayout {
    pub fn total_runs(&self) -> usize {
        self.scenarios * self.points_per_scenario
    }

    /// Run indices of scenario `block`
    pub fn block(&self, block: usize) -> Result<std::ops::Range<usize>> {
        if block >= self.scenarios {
            return Err(Error::invalid(
                "block",
                block,
                format!("must be below {}", self.scenarios),
            ));
        }
        let start = block * self.points_per_scenario;
        Ok(start..start + self.points_per_scenario)
    }

    fn check_runs(&self, runs: usize) -> Result<()> {
        if runs != self.total_runs() {
            return Err(Error::invalid(
                "runs",
                runs,
                format!(
                    "expected {} scenarios × {} points = {} runs",
                    self.scenarios,
                    self.points_per_scenario,
                    self.total_runs()
                ),
            ));
        }
        Ok(())
    }
}

/// Moments of the curated PEM outputs with the default 3 × 8 layout.
pub fn compute_pem_moments(table: &ScalarFeatureTable) -> Result<MomentSummary> {
    compute_pem_moments_with(table, PemLayout::default())
}

/// Moments of the curated PEM outputs, block by block.
///
/// # Errors
/// [`Error::InvalidParameter`] if the table does not hold exactly
/// `layout.total_runs()` runs.
pub fn compute_pem_moments_with(
    table: &ScalarFeatureTable,
    layout: PemLayout,
) -> Result<MomentSummary> {
    layout.check_runs(table.rows())?;

    let mut summary = MomentSummary::new();
    for (scalar, values) in table.iter() {
        for block in 0..layout.scenarios {
            summary.push_scenario(scalar, &values[layout.block(block)?]);
        }
    }
    Ok(summary)
}

/// Per-cell mean and standard deviation of one PEM block of a flattened
/// field (runs × active cells), mapped onto the grid.
pub fn pem_field_moments(
    values: ArrayView2<'_, f64>,
    mask: &ValidColumnMask,
    block: usize,
    layout: PemLayout,
    transform: GeoTransform,
) -> Result<FieldStatistics> {
    layout.check_runs(values.nrows())?;
    let rows: Vec<usize> = layout.block(block)?.collect();
    let block_values = values.select(Axis(0), &rows);
    mask.field_statistics(block_values.view(), transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moments::MomentKind;
    use crate::scalars::ScalarKind;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn table() -> ScalarFeatureTable {
        // block 0 constant, block 1 linear, block 2 skewed
        let mut dv = vec![0.5; 8];
        dv.extend((0..8).map(|i| i as f64));
        dv.extend([0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 8.0]);
        ScalarFeatureTable::from_columns([(ScalarKind::Dv, dv)]).unwrap()
    }

    #[test]
    fn test_block_moments() {
        let summary = compute_pem_moments(&table()).unwrap();
        let mean = summary.get(MomentKind::Mean, ScalarKind::Dv).unwrap();
        assert_eq!(mean, &[0.5, 3.5, 1.0]);

        let var = summary.get(MomentKind::Var, ScalarKind::Dv).unwrap();
        assert_eq!(var[0], 0.0);
        assert_eq!(var[1], 6.0);
        assert_eq!(var[2], 8.0);

        let skew = summary.get(MomentKind::Skew, ScalarKind::Dv).unwrap();
        assert!(skew[0].is_nan());
        assert_eq!(skew[1], 0.0);
        assert!(skew[2] > 2.0);
    }

    #[test]
    fn test_outputs_rounded() {
        let mut values = vec![0.0; 24];
        values[1] = 1.0 / 3.0;
        let t = ScalarFeatureTable::from_columns([(ScalarKind::Ia, values)]).unwrap();
        let summary = compute_pem_moments(&t).unwrap();
        for (_, _, v) in summary.iter() {
            for x in v.iter().filter(|x| x.is_finite()) {
                assert_relative_eq!(x * 1000.0, (x * 1000.0).round(), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_wrong_row_count() {
        let t = ScalarFeatureTable::from_columns([(ScalarKind::Ia, vec![0.0; 23])]).unwrap();
        assert!(matches!(
            compute_pem_moments(&t),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_field_moments_of_block() {
        let mask = ValidColumnMask::from_counts(vec![3, 0, 1, 2], 2, 2).unwrap();
        let mut values = Array2::zeros((24, 3));
        for r in 8..16 {
            values[[r, 0]] = if r % 2 == 0 { 1.0 } else { 3.0 };
            values[[r, 2]] = 5.0;
        }
        let stats =
            pem_field_moments(values.view(), &mask, 1, PemLayout::default(), GeoTransform::default())
                .unwrap();
        assert_relative_eq!(stats.mean.data()[[0, 0]], 2.0);
        assert_relative_eq!(stats.std.data()[[0, 0]], 1.0);
        assert_relative_eq!(stats.mean.data()[[1, 1]], 5.0);
        assert_eq!(stats.std.data()[[1, 1]], 0.0);
        assert_eq!(stats.mean.data()[[0, 1]], 0.0);

        assert!(pem_field_moments(values.view(), &mask, 3, PemLayout::default(), GeoTransform::default())
            .is_err());
    }
}
