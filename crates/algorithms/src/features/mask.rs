//! Active-cell masks and flattened stacks
//!
//! A field emulator works on the cells that are ever impacted. The mask
//! stores, for every cell of the grid (row-major), how many bands reach the
//! threshold there; a cell is *active* when that count is non-zero. The
//! same mask must be reused for validation stacks and for mapping
//! predictions back onto the grid.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use flowuq_core::{Error, GeoTransform, Raster, RasterStack, Result};

use super::Threshold;

/// Per-cell activation counts over a stack, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidColumnMask {
    rows: usize,
    cols: usize,
    counts: Vec<u32>,
}

impl ValidColumnMask {
    /// Count, per cell, the bands whose value reaches `threshold`.
    pub fn from_stack(stack: &RasterStack, threshold: Threshold) -> Self {
        let (rows, cols) = stack.shape();
        let mut counts = vec![0u32; rows * cols];
        for band in stack.bands() {
            for (count, &v) in counts.iter_mut().zip(band.iter()) {
                if threshold.admits(v) {
                    *count += 1;
                }
            }
        }
        Self { rows, cols, counts }
    }

    /// Wrap precomputed counts.
    pub fn from_counts(counts: Vec<u32>, rows: usize, cols: usize) -> Result<Self> {
        if counts.len() != rows * cols {
            return Err(Error::DimensionMismatch {
                what: "mask cells",
                expected: rows * cols,
                actual: counts.len(),
            });
        }
        Ok(Self { rows, cols, counts })
    }

    /// Grid shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of grid cells
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Number of bands reaching the threshold at flat cell `index`
    pub fn activation_count(&self, index: usize) -> u32 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    /// Flat indices of the active cells, ascending.
    pub fn active_indices(&self) -> Vec<usize> {
        self.active_indices_min(1)
    }

    /// Flat indices of cells active in at least `min_bands` bands.
    pub fn active_indices_min(&self, min_bands: u32) -> Vec<usize> {
        let min_bands = min_bands.max(1);
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c >= min_bands)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of active cells
    pub fn active_count(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Place one row of active-cell values back onto the full grid,
    /// filling inactive cells with zero.
    pub fn reconstruct(&self, values: ArrayView1<'_, f64>) -> Result<Array2<f64>> {
        let full = self.scatter_row(values)?;
        full.into_shape_with_order((self.rows, self.cols))
            .map_err(|e| Error::Other(e.to_string()))
    }

    /// Scatter each row of `values` (m × active) into an m × cells matrix.
    pub fn scatter_rows(&self, values: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let active = self.active_indices();
        if values.ncols() != active.len() {
            return Err(Error::DimensionMismatch {
                what: "active cells",
                expected: active.len(),
                actual: values.ncols(),
            });
        }
        let mut full = Array2::zeros((values.nrows(), self.len()));
        for (mut out, row) in full.outer_iter_mut().zip(values.outer_iter()) {
            for (&idx, &v) in active.iter().zip(row.iter()) {
                out[idx] = v;
            }
        }
        Ok(full)
    }

    fn scatter_row(&self, values: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let full = self.scatter_rows(values.insert_axis(Axis(0)))?;
        Ok(full.index_axis_move(Axis(0), 0))
    }

    /// Mean and population standard deviation per cell across the rows of
    /// `values` (m × active), mapped back onto the grid.
    pub fn field_statistics(
        &self,
        values: ArrayView2<'_, f64>,
        transform: GeoTransform,
    ) -> Result<FieldStatistics> {
        if values.nrows() == 0 {
            return Err(Error::Algorithm("no rows to summarise".into()));
        }
        let full = self.scatter_rows(values)?;
        let mean = full
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Algorithm("no rows to summarise".into()))?;
        let std = full.std_axis(Axis(0), 0.0);

        let to_raster = |v: Array1<f64>| -> Result<Raster<f64>> {
            let grid = v
                .into_shape_with_order((self.rows, self.cols))
                .map_err(|e| Error::Other(e.to_string()))?;
            Ok(Raster::from_array(grid).with_transform(transform))
        };
        Ok(FieldStatistics {
            mean: to_raster(mean)?,
            std: to_raster(std)?,
        })
    }

    /// Activation counts as a georeferenced grid
    pub fn to_raster(&self, transform: GeoTransform) -> Result<Raster<u32>> {
        Raster::from_vec(self.counts.clone(), self.rows, self.cols)
            .map(|r| r.with_transform(transform))
    }
}

/// Per-cell mean and standard deviation of a set of field realisations
#[derive(Debug, Clone)]
pub struct FieldStatistics {
    pub mean: Raster<f64>,
    pub std: Raster<f64>,
}

/// A stack reduced to its active cells
#[derive(Debug, Clone)]
pub struct FlattenedStack {
    /// bands × active cells, ascending flat-index order
    pub values: Array2<f64>,
    pub mask: ValidColumnMask,
}

/// Flatten `stack` to its active cells.
///
/// Without `mask`, the mask is computed from this stack at `threshold`.
/// With `mask` (typically the training mask), it is applied as-is so that
/// columns line up with the training data.
///
/// # Errors
/// - [`Error::InvalidParameter`] for a negative or non-finite threshold
/// - [`Error::SizeMismatch`] if a supplied mask has a different grid shape
pub fn flatten_with_mask(
    stack: &RasterStack,
    threshold: f64,
    mask: Option<&ValidColumnMask>,
) -> Result<FlattenedStack> {
    let threshold = Threshold::new(threshold)?;

    let mask = match mask {
        Some(m) => {
            let (er, ec) = m.shape();
            let (ar, ac) = stack.shape();
            if (er, ec) != (ar, ac) {
                return Err(Error::SizeMismatch { er, ec, ar, ac });
            }
            m.clone()
        }
        None => ValidColumnMask::from_stack(stack, threshold),
    };

    let unstacked = stack
        .data()
        .to_shape((stack.band_count(), stack.cells()))
        .map_err(|e| Error::Other(e.to_string()))?;
    let values = unstacked.select(Axis(1), &mask.active_indices());

    tracing::debug!(
        bands = stack.band_count(),
        active = values.ncols(),
        cells = stack.cells(),
        "flattened stack"
    );

    Ok(FlattenedStack { values, mask })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn stack() -> RasterStack {
        RasterStack::from_bands(
            vec![
                array![[0.0, 0.5], [0.0, 0.0]],
                array![[0.2, 0.05], [0.0, 0.0]],
                array![[0.0, 0.3], [0.0, 0.1]],
            ],
            GeoTransform::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_counts_and_active_cells() {
        let mask = ValidColumnMask::from_stack(&stack(), Threshold::new(0.1).unwrap());
        assert_eq!(mask.counts(), &[1, 2, 0, 1]);
        assert_eq!(mask.active_indices(), vec![0, 1, 3]);
        assert_eq!(mask.active_indices_min(2), vec![1]);
        assert_eq!(mask.active_count(), 3);
        assert_eq!(mask.activation_count(2), 0);
    }

    #[test]
    fn test_flatten_keeps_all_values_of_active_cells() {
        let flat = flatten_with_mask(&stack(), 0.1, None).unwrap();
        // below-threshold values in active columns are kept, not zeroed
        assert_eq!(
            flat.values,
            array![[0.0, 0.5, 0.0], [0.2, 0.05, 0.0], [0.0, 0.3, 0.1]]
        );
    }

    #[test]
    fn test_flatten_with_supplied_mask() {
        let training = flatten_with_mask(&stack(), 0.1, None).unwrap();
        let other = RasterStack::from_bands(
            vec![array![[9.0, 8.0], [7.0, 6.0]]],
            GeoTransform::default(),
        )
        .unwrap();
        let flat = flatten_with_mask(&other, 0.1, Some(&training.mask)).unwrap();
        assert_eq!(flat.values, array![[9.0, 8.0, 6.0]]);
        assert_eq!(flat.mask, training.mask);
    }

    #[test]
    fn test_flatten_rejects_mismatched_mask() {
        let mask = ValidColumnMask::from_counts(vec![1; 9], 3, 3).unwrap();
        assert!(matches!(
            flatten_with_mask(&stack(), 0.1, Some(&mask)),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_flatten_rejects_negative_threshold() {
        assert!(matches!(
            flatten_with_mask(&stack(), -1.0, None),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_reconstruct_round_trip() {
        let flat = flatten_with_mask(&stack(), 0.1, None).unwrap();
        let grid = flat.mask.reconstruct(flat.values.row(2)).unwrap();
        assert_eq!(grid, array![[0.0, 0.3], [0.0, 0.1]]);
        assert!(flat.mask.reconstruct(array![1.0, 2.0].view()).is_err());
    }

    #[test]
    fn test_flatten_reconstruct_recovers_active_cells() {
        let mut rng = 2024u64;
        let mut next = || {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 33) as f64 / (1u64 << 31) as f64
        };

        for trial in 0..6 {
            let (rows, cols) = (3 + trial, 8 - trial);
            let bands: Vec<Array2<f64>> = (0..5)
                .map(|_| {
                    Array2::from_shape_simple_fn((rows, cols), || {
                        // roughly half the cells stay dry
                        let v = next();
                        if v < 0.5 { 0.0 } else { 2.0 * (v - 0.5) }
                    })
                })
                .collect();
            let stack = RasterStack::from_bands(bands, GeoTransform::default()).unwrap();

            for threshold in [0.0, 0.1, 0.5, 1.0] {
                let flat = flatten_with_mask(&stack, threshold, None).unwrap();
                let active = flat.mask.active_indices();
                assert_eq!(flat.values.ncols(), active.len());

                let expected: Vec<usize> = (0..rows * cols)
                    .filter(|&i| stack.bands().any(|b| b[[i / cols, i % cols]] >= threshold))
                    .collect();
                assert_eq!(active, expected, "threshold {threshold}");

                for (row, band) in flat.values.outer_iter().zip(stack.bands()) {
                    let grid = flat.mask.reconstruct(row).unwrap();
                    for (i, (&got, &orig)) in grid.iter().zip(band.iter()).enumerate() {
                        let want = if active.binary_search(&i).is_ok() { orig } else { 0.0 };
                        assert_eq!(got, want);
                    }
                }
            }
        }
    }

    #[test]
    fn test_field_statistics() {
        let mask = ValidColumnMask::from_counts(vec![1, 0, 1, 0], 2, 2).unwrap();
        let values = array![[1.0, 2.0], [3.0, 6.0]];
        let stats = mask.field_statistics(values.view(), GeoTransform::default()).unwrap();
        assert_eq!(stats.mean.data(), &array![[2.0, 0.0], [4.0, 0.0]]);
        assert_relative_eq!(stats.std.data()[[0, 0]], 1.0);
        assert_relative_eq!(stats.std.data()[[1, 0]], 2.0);
        assert_eq!(stats.std.data()[[0, 1]], 0.0);
    }

    #[test]
    fn test_mask_raster() {
        let mask = ValidColumnMask::from_stack(&stack(), Threshold::default());
        let raster = mask.to_raster(GeoTransform::default()).unwrap();
        assert_eq!(raster.data(), &array![[1, 2], [0, 1]]);
    }
}
