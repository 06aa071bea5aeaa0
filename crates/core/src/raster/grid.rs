//! Single georeferenced grid

use crate::error::{Error, Result};
use crate::raster::{Bounds, GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D grid.
///
/// Used for reconstructed emulator fields (per-cell mean and standard
/// deviation) and for visualising activation masks.
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Row-major (row, col) data
    data: Array2<T>,
    transform: GeoTransform,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled raster
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Wrap an existing array with the default transform
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
        }
    }

    /// Build from row-major values
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Builder-style transform assignment
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Cell size (square cells assumed)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    pub fn bounds(&self) -> Bounds {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Min, max and mean over finite cells
    pub fn statistics(&self) -> RasterStatistics {
        let mut stats = RasterStatistics {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: f64::NAN,
            valid_count: 0,
        };
        let mut sum = 0.0;

        for v in self.data.iter().filter_map(|v| v.to_f64()) {
            if !v.is_finite() {
                continue;
            }
            stats.min = stats.min.min(v);
            stats.max = stats.max.max(v);
            sum += v;
            stats.valid_count += 1;
        }
        if stats.valid_count > 0 {
            stats.mean = sum / stats.valid_count as f64;
        }
        stats
    }
}

/// Summary statistics of a raster
#[derive(Debug, Clone, Copy)]
pub struct RasterStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub valid_count: usize,
}
