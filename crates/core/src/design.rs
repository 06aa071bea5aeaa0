//! Design matrices of sampled physical parameters
//!
//! Rows are simulation (or sample) indices, columns are physical parameters
//! such as basal friction, turbulent friction and release volume.

use std::io::Read;
use std::path::Path;

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::{Error, Result};

/// A validated, non-empty, all-finite design matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    data: Array2<f64>,
}

impl DesignMatrix {
    /// Validate and wrap an array.
    pub fn from_array(data: Array2<f64>) -> Result<Self> {
        let (rows, cols) = data.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::invalid(
                "design",
                format!("{rows}x{cols}"),
                "design matrix must have at least one row and one column",
            ));
        }
        if let Some(bad) = data.iter().find(|v| !v.is_finite()) {
            return Err(Error::invalid("design", bad, "design values must be finite"));
        }
        Ok(Self { data })
    }

    /// Load a CSV file with one header row.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        tracing::debug!(path = %path.display(), "reading design matrix");
        Self::collect(reader)
    }

    /// Parse CSV from any reader (header row skipped).
    pub fn from_csv_reader<R: Read>(rdr: R) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        Self::collect(reader)
    }

    fn collect<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let mut values = Vec::new();
        let mut cols = 0;
        let mut rows = 0;

        for (row_no, record) in reader.records().enumerate() {
            let record = record?;
            if rows == 0 {
                cols = record.len();
            }
            for field in record.iter() {
                let v: f64 = field.parse().map_err(|_| {
                    Error::invalid("design", field, format!("row {}: not a number", row_no + 1))
                })?;
                values.push(v);
            }
            rows += 1;
        }

        let data = Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| Error::Other(e.to_string()))?;
        Self::from_array(data)
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.data.row(index)
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }
}
