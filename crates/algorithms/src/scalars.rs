//! Scalar quantities of interest and their per-run table

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use flowuq_core::{Error, Result};

/// A scalar summary of one simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    /// Impacted area (km²)
    Ia,
    /// Deposit area (km²)
    Da,
    /// Deposit volume (10⁶ m³)
    Dv,
    /// Maximum velocity at the extraction point
    Vmax,
    /// Maximum flow height at the extraction point
    Hmax,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 5] = [
        ScalarKind::Ia,
        ScalarKind::Da,
        ScalarKind::Dv,
        ScalarKind::Vmax,
        ScalarKind::Hmax,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Ia => "ia",
            ScalarKind::Da => "da",
            ScalarKind::Dv => "dv",
            ScalarKind::Vmax => "vmax",
            ScalarKind::Hmax => "hmax",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ScalarKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::invalid("scalar", s, "must be ia, da, dv, vmax or hmax"))
    }
}

/// One column per scalar kind, one row per simulation run.
///
/// All columns have the same length; row `i` belongs to band `i` of the
/// stacks it was computed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScalarFeatureTable {
    columns: BTreeMap<ScalarKind, Vec<f64>>,
}

impl ScalarFeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(kind, values)` pairs of equal length.
    pub fn from_columns<I>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ScalarKind, Vec<f64>)>,
    {
        let mut table = Self::new();
        for (kind, values) in columns {
            table.insert(kind, values)?;
        }
        Ok(table)
    }

    /// Add or replace a column.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] if the length differs from the columns
    /// already present.
    pub fn insert(&mut self, kind: ScalarKind, values: Vec<f64>) -> Result<()> {
        let existing = self
            .columns
            .iter()
            .find(|(k, _)| **k != kind)
            .map(|(_, v)| v.len());
        if let Some(rows) = existing
            && rows != values.len()
        {
            return Err(Error::DimensionMismatch {
                what: "scalar column length",
                expected: rows,
                actual: values.len(),
            });
        }
        self.columns.insert(kind, values);
        Ok(())
    }

    /// Number of runs (0 for an empty table)
    pub fn rows(&self) -> usize {
        self.columns.values().next().map_or(0, Vec::len)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ScalarKind> + '_ {
        self.columns.keys().copied()
    }

    pub fn contains(&self, kind: ScalarKind) -> bool {
        self.columns.contains_key(&kind)
    }

    /// Values of one scalar
    pub fn get(&self, kind: ScalarKind) -> Result<&[f64]> {
        self.columns
            .get(&kind)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::invalid("scalar", kind, "not present in the feature table"))
    }

    /// Values of one scalar as an array
    pub fn column(&self, kind: ScalarKind) -> Result<Array1<f64>> {
        self.get(kind).map(|v| Array1::from(v.to_vec()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScalarKind, &[f64])> {
        self.columns.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Write as CSV with a header row in scalar order.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.kinds().map(|k| k.as_str()))?;
        for row in 0..self.rows() {
            wtr.write_record(self.columns.values().map(|v| v[row].to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("dv".parse::<ScalarKind>().unwrap(), ScalarKind::Dv);
        assert!(matches!(
            "pmax".parse::<ScalarKind>(),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_kind_order() {
        let mut kinds = vec![ScalarKind::Hmax, ScalarKind::Ia, ScalarKind::Vmax];
        kinds.sort();
        assert_eq!(kinds, vec![ScalarKind::Ia, ScalarKind::Vmax, ScalarKind::Hmax]);
    }

    #[test]
    fn test_table_rejects_ragged_columns() {
        let mut table = ScalarFeatureTable::new();
        table.insert(ScalarKind::Ia, vec![1.0, 2.0]).unwrap();
        assert!(table.insert(ScalarKind::Da, vec![1.0]).is_err());
        // replacing the only column with a new length is fine
        table.insert(ScalarKind::Ia, vec![1.0]).unwrap();
        assert_eq!(table.rows(), 1);
    }

    #[test]
    fn test_missing_column() {
        let table = ScalarFeatureTable::from_columns([
            (ScalarKind::Ia, vec![0.0, 1.0, 2.0, 3.0]),
            (ScalarKind::Hmax, vec![4.0, 5.0, 6.0, 7.0]),
        ])
        .unwrap();
        assert_eq!(table.get(ScalarKind::Hmax).unwrap(), &[4.0, 5.0, 6.0, 7.0]);
        assert!(table.get(ScalarKind::Dv).is_err());
    }

    #[test]
    fn test_csv_and_json_output() {
        let table = ScalarFeatureTable::from_columns([
            (ScalarKind::Hmax, vec![1.5]),
            (ScalarKind::Ia, vec![0.25]),
        ])
        .unwrap();
        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "ia,hmax\n0.25,1.5\n");
        assert_eq!(
            serde_json::to_string(&table).unwrap(),
            r#"{"ia":[0.25],"hmax":[1.5]}"#
        );
    }
}
