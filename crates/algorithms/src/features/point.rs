//! Point extraction

use flowuq_core::{Error, Location, RasterStack, Result};

/// Value of every band at map coordinate (`x`, `y`).
///
/// The point must lie strictly inside the stack's extent; a coordinate on
/// an edge is rejected. The containing cell is found by flooring the
/// fractional pixel position.
///
/// # Errors
/// - [`Error::InvalidParameter`] for non-finite coordinates
/// - [`Error::OutOfBounds`] naming the offending axis
pub fn extract_point(stack: &RasterStack, x: f64, y: f64) -> Result<Vec<f64>> {
    let loc = Location::new(x, y)?;
    stack.bounds().check_strict(loc.x, loc.y)?;

    let (row, col) = stack.transform().index(loc.x, loc.y)?;
    let (rows, cols) = stack.shape();
    if row >= rows || col >= cols {
        return Err(Error::IndexOutOfBounds { row, col, rows, cols });
    }

    Ok(stack.bands().map(|band| band[[row, col]]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowuq_core::GeoTransform;
    use ndarray::Array2;

    /// 3×3 bands over [0, 30] × [0, 30]; band b holds `100·b + row·3 + col`.
    fn indexed_stack() -> RasterStack {
        let bands = (0..2)
            .map(|b| Array2::from_shape_fn((3, 3), |(r, c)| (100 * b + r * 3 + c) as f64))
            .collect();
        RasterStack::from_bands(bands, GeoTransform::new(0.0, 30.0, 10.0, -10.0)).unwrap()
    }

    #[test]
    fn test_extracts_containing_cell() {
        let stack = indexed_stack();
        // x = 15 → col 1, y = 5 → row 2
        assert_eq!(extract_point(&stack, 15.0, 5.0).unwrap(), vec![7.0, 107.0]);
        // upper-left corner region
        assert_eq!(extract_point(&stack, 0.5, 29.5).unwrap(), vec![0.0, 100.0]);
    }

    #[test]
    fn test_interior_cell_edge_floors() {
        let stack = indexed_stack();
        // x = 10 sits on the col 0 / col 1 boundary and belongs to col 1
        assert_eq!(extract_point(&stack, 10.0, 25.0).unwrap()[0], 1.0);
    }

    #[test]
    fn test_rejects_points_on_or_outside_edges() {
        let stack = indexed_stack();
        for (x, y, axis) in [
            (0.0, 15.0, "x"),
            (30.0, 15.0, "x"),
            (-1.0, 15.0, "x"),
            (15.0, 0.0, "y"),
            (15.0, 30.0, "y"),
            (15.0, 1e9, "y"),
        ] {
            match extract_point(&stack, x, y) {
                Err(Error::OutOfBounds { axis: a, .. }) => assert_eq!(a, axis),
                other => panic!("expected OutOfBounds for ({x}, {y}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_rejects_nan_coordinate() {
        assert!(matches!(
            extract_point(&indexed_stack(), f64::NAN, 5.0),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
