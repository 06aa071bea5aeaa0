//! Impacted area, deposit area and deposit volume

use flowuq_core::{RasterStack, Result};

use super::{Threshold, M2_PER_KM2};
use crate::moments::round_decimals;

/// Area in km² of the cells at or above `threshold`, one value per band.
///
/// Each admitted cell contributes `resolution²` m². Applied to `hmax` this
/// is the impacted area; applied to `hfin` it is the deposit area.
///
/// # Errors
/// [`flowuq_core::Error::InvalidParameter`] if `threshold` is negative or
/// not finite.
pub fn compute_area(stack: &RasterStack, threshold: f64) -> Result<Vec<f64>> {
    let threshold = Threshold::new(threshold)?;
    let cell_area = stack.resolution().powi(2);

    Ok(stack
        .bands()
        .map(|band| {
            let count = band.iter().filter(|&&v| threshold.admits(v)).count();
            count as f64 * cell_area / M2_PER_KM2
        })
        .collect())
}

/// Deposit volume in 10⁶ m³ per band, rounded to three decimals.
///
/// Sums `height × resolution²` over the admitted cells. A NaN cell makes
/// the band's volume NaN.
pub fn compute_volume(stack: &RasterStack, threshold: f64) -> Result<Vec<f64>> {
    let threshold = Threshold::new(threshold)?;
    let cell_area = stack.resolution().powi(2);

    Ok(stack
        .bands()
        .map(|band| {
            let volume: f64 = band
                .iter()
                .filter(|&&v| threshold.admits(v) || v.is_nan())
                .map(|&v| v * cell_area)
                .sum();
            round_decimals(volume / M2_PER_KM2, 3)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use flowuq_core::{Error, GeoTransform};
    use ndarray::Array2;

    fn two_band_stack(res: f64) -> RasterStack {
        let mut first = Array2::zeros((2, 2));
        first.fill(0.5);
        let second = Array2::zeros((2, 2));
        RasterStack::from_bands(vec![first, second], GeoTransform::new(0.0, 2.0 * res, res, -res))
            .unwrap()
    }

    #[test]
    fn test_area_counts_cells_above_threshold() {
        let area = compute_area(&two_band_stack(1.0), 0.1).unwrap();
        assert_eq!(area.len(), 2);
        assert_relative_eq!(area[0], 4.0e-6);
        assert_eq!(area[1], 0.0);
    }

    #[test]
    fn test_area_scales_with_resolution() {
        let area = compute_area(&two_band_stack(10.0), 0.1).unwrap();
        assert_relative_eq!(area[0], 4.0e-4);
    }

    #[test]
    fn test_area_threshold_is_inclusive() {
        let area = compute_area(&two_band_stack(1.0), 0.5).unwrap();
        assert_relative_eq!(area[0], 4.0e-6);
        let area = compute_area(&two_band_stack(1.0), 0.51).unwrap();
        assert_eq!(area[0], 0.0);
    }

    #[test]
    fn test_negative_threshold_rejected() {
        assert!(matches!(
            compute_area(&two_band_stack(1.0), -1.0),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(compute_volume(&two_band_stack(1.0), -0.1).is_err());
    }

    #[test]
    fn test_volume_sums_heights() {
        let mut band = Array2::zeros((10, 10));
        band.fill(2.0);
        band[[0, 0]] = 0.05;
        let stack =
            RasterStack::from_bands(vec![band], GeoTransform::new(0.0, 100.0, 10.0, -10.0))
                .unwrap();
        // 99 cells × 2 m × 100 m² = 19 800 m³
        let volume = compute_volume(&stack, 0.1).unwrap();
        assert_relative_eq!(volume[0], 0.02);
    }

    #[test]
    fn test_volume_rounds_ties_to_even() {
        // 25 cells × 1 m × 100 m² = 2 500 m³ = 0.0025 × 10⁶ m³
        let stack = RasterStack::from_bands(
            vec![Array2::from_elem((5, 5), 1.0)],
            GeoTransform::new(0.0, 50.0, 10.0, -10.0),
        )
        .unwrap();
        assert_eq!(compute_volume(&stack, 0.1).unwrap(), vec![0.002]);
    }

    #[test]
    fn test_volume_nan_cell_poisons_band() {
        let mut band = Array2::from_elem((3, 3), 1.0);
        band[[1, 1]] = f64::NAN;
        let stack = RasterStack::from_bands(
            vec![band, Array2::from_elem((3, 3), 1.0)],
            GeoTransform::new(0.0, 300.0, 100.0, -100.0),
        )
        .unwrap();
        let volume = compute_volume(&stack, 0.1).unwrap();
        assert!(volume[0].is_nan());
        assert_relative_eq!(volume[1], 0.09);
        // area ignores NaN cells
        assert_relative_eq!(compute_area(&stack, 0.1).unwrap()[0], 0.08);
    }

    #[test]
    fn test_area_and_volume_shrink_with_threshold() {
        let mut seed = 7u64;
        let mut next = || {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (seed >> 11) as f64 / (1u64 << 53) as f64
        };
        let bands: Vec<Array2<f64>> = (0..4)
            .map(|_| Array2::from_shape_fn((12, 9), |_| 2.0 * next() - 0.3))
            .collect();
        let stack =
            RasterStack::from_bands(bands, GeoTransform::new(0.0, 60.0, 5.0, -5.0)).unwrap();

        let thresholds = [0.0, 0.05, 0.1, 0.5, 1.0, 1.5, 2.5];
        let areas: Vec<Vec<f64>> =
            thresholds.iter().map(|&t| compute_area(&stack, t).unwrap()).collect();
        let volumes: Vec<Vec<f64>> =
            thresholds.iter().map(|&t| compute_volume(&stack, t).unwrap()).collect();

        for pair in areas.windows(2).chain(volumes.windows(2)) {
            for (lo, hi) in pair[0].iter().zip(&pair[1]) {
                assert!(hi <= lo, "{hi} > {lo}");
            }
        }
        assert!(areas.last().unwrap().iter().all(|&a| a == 0.0));
        assert!(volumes.last().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_area_nonnegative() {
        let stack = RasterStack::from_bands(
            vec![Array2::from_elem((3, 3), -5.0), Array2::from_elem((3, 3), f64::NAN)],
            GeoTransform::default(),
        )
        .unwrap();
        let area = compute_area(&stack, 0.0).unwrap();
        assert!(area.iter().all(|&a| a == 0.0));
    }
}
