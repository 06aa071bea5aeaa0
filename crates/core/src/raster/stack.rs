//! Multi-band simulation stacks

use ndarray::{Array2, Array3, ArrayView2, Axis, Zip};

use crate::error::{Error, Result};
use crate::raster::{Bounds, GeoTransform};

/// A stack of co-registered grids, one band per simulation run.
///
/// All bands share the same shape and [`GeoTransform`]; the constructors
/// enforce this so downstream code can index bands interchangeably.
#[derive(Debug, Clone)]
pub struct RasterStack {
    /// (band, row, col)
    data: Array3<f64>,
    transform: GeoTransform,
}

impl RasterStack {
    /// Build a stack from individual bands.
    ///
    /// # Errors
    /// - [`Error::InvalidDimensions`] if `bands` is empty or zero-sized
    /// - [`Error::SizeMismatch`] if any band differs in shape from the first
    pub fn from_bands(bands: Vec<Array2<f64>>, transform: GeoTransform) -> Result<Self> {
        let Some(first) = bands.first() else {
            return Err(Error::InvalidDimensions { width: 0, height: 0 });
        };
        let (rows, cols) = first.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let mut data = Array3::zeros((bands.len(), rows, cols));
        for (mut slot, band) in data.outer_iter_mut().zip(bands.iter()) {
            let (ar, ac) = band.dim();
            if (ar, ac) != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar,
                    ac,
                });
            }
            slot.assign(band);
        }

        Ok(Self { data, transform })
    }

    /// Wrap a (band, row, col) array.
    pub fn from_array(data: Array3<f64>, transform: GeoTransform) -> Result<Self> {
        let (bands, rows, cols) = data.dim();
        if bands == 0 || rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self { data, transform })
    }

    /// Number of bands (simulation runs)
    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Grid shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Cells per band
    pub fn cells(&self) -> usize {
        self.rows() * self.cols()
    }

    /// View of one band (0-based)
    pub fn band(&self, index: usize) -> Result<ArrayView2<'_, f64>> {
        if index >= self.band_count() {
            return Err(Error::DimensionMismatch {
                what: "band index",
                expected: self.band_count(),
                actual: index,
            });
        }
        Ok(self.data.index_axis(Axis(0), index))
    }

    /// Iterate over bands in run order
    pub fn bands(&self) -> impl Iterator<Item = ArrayView2<'_, f64>> {
        self.data.outer_iter()
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Pixel resolution (square cells assumed)
    pub fn resolution(&self) -> f64 {
        self.transform.cell_size()
    }

    pub fn bounds(&self) -> Bounds {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Per-cell maximum across bands
    pub fn max_envelope(&self) -> Array2<f64> {
        let mut out = Array2::from_elem(self.shape(), f64::NEG_INFINITY);
        for band in self.bands() {
            Zip::from(&mut out).and(&band).for_each(|o, &v| {
                if v > *o {
                    *o = v;
                }
            });
        }
        out
    }
}
