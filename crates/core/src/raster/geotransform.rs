//! Affine georeferencing for simulation grids

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Affine transformation between pixel space (col, row) and map space (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// Simulation outputs are north-up, so `pixel_height` is negative and the
/// rotation terms are zero in practice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X
    pub pixel_width: f64,
    /// Cell size in Y (negative for north-up)
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform without rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from GDAL ordering `[origin_x, pixel_width, row_rot, origin_y, col_rot, pixel_height]`
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Map coordinates of the centre of cell (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.fractional_to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Map coordinates of the upper-left corner of cell (col, row)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.fractional_to_geo(col as f64, row as f64)
    }

    fn fractional_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Fractional pixel coordinates (col, row) of a map coordinate.
    ///
    /// Returns NaN for a degenerate transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-10 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        (col, row)
    }

    /// Integer (row, col) of the cell containing (x, y).
    ///
    /// Fractional pixel coordinates are floored, so a point on a cell's
    /// upper-left edge belongs to that cell. Callers are expected to bounds
    /// check first; a point left of / above the grid yields an error.
    pub fn index(&self, x: f64, y: f64) -> Result<(usize, usize)> {
        let (col, row) = self.geo_to_pixel(x, y);
        if !col.is_finite() || !row.is_finite() {
            return Err(Error::Algorithm("degenerate geotransform".into()));
        }
        let (col, row) = (col.floor(), row.floor());
        if col < 0.0 || row < 0.0 {
            return Err(Error::Other(format!(
                "({x}, {y}) maps to negative pixel ({row}, {col})"
            )));
        }
        Ok((row as usize, col as usize))
    }

    /// Cell size (square cells assumed)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Bounding box of a `width` × `height` grid
    pub fn bounds(&self, width: usize, height: usize) -> Bounds {
        let corners = [
            self.pixel_to_geo_corner(0, 0),
            self.pixel_to_geo_corner(width, 0),
            self.pixel_to_geo_corner(0, height),
            self.pixel_to_geo_corner(width, height),
        ];

        let mut b = Bounds {
            left: f64::INFINITY,
            bottom: f64::INFINITY,
            right: f64::NEG_INFINITY,
            top: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            b.left = b.left.min(x);
            b.right = b.right.max(x);
            b.bottom = b.bottom.min(y);
            b.top = b.top.max(y);
        }
        b
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

/// Spatial extent of a grid (left, bottom, right, top)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Bounds {
    /// Reject points on or outside the extent.
    ///
    /// The inequality is strict on every edge: a coordinate equal to a
    /// bound is out of bounds.
    pub fn check_strict(&self, x: f64, y: f64) -> Result<()> {
        if !(x > self.left && x < self.right) {
            return Err(Error::OutOfBounds {
                axis: "x",
                value: x,
                min: self.left,
                max: self.right,
            });
        }
        if !(y > self.bottom && y < self.top) {
            return Err(Error::OutOfBounds {
                axis: "y",
                value: y,
                min: self.bottom,
                max: self.top,
            });
        }
        Ok(())
    }
}
