//! A named set of simulation outputs
//!
//! [`SimulationSet`] ties a dataset name to a [`StackSource`] and exposes
//! the per-run features used to train emulators. Grid metadata is read once
//! from the `hmax` stack at construction; every calculation afterwards
//! opens the stack it needs and drops it when done.

use flowuq_core::{
    Bounds, DatasetName, Error, Location, Qoi, RasterStack, Result, StackSource,
};
use serde::{Deserialize, Serialize};

use crate::features::{
    compute_area, compute_volume, extract_point, flatten_with_mask, lateral_spread,
    FlattenedStack, LateralSpread, Threshold, ValidColumnMask,
};
use crate::scalars::{ScalarFeatureTable, ScalarKind};

/// Threshold and extraction point used to curate scalar outputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurationSettings {
    pub threshold: Threshold,
    pub location: Location,
}

impl CurationSettings {
    pub fn new(threshold: f64, x: f64, y: f64) -> Result<Self> {
        Ok(Self {
            threshold: Threshold::new(threshold)?,
            location: Location::new(x, y)?,
        })
    }

    /// Default threshold and the dataset's reference location
    pub fn for_dataset(name: DatasetName) -> Self {
        Self {
            threshold: Threshold::default(),
            location: name.default_location(),
        }
    }
}

/// Simulation outputs of one dataset
pub struct SimulationSet {
    name: DatasetName,
    source: Box<dyn StackSource>,
    size: usize,
    resolution: f64,
    bounds: Bounds,
}

impl std::fmt::Debug for SimulationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationSet")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("resolution", &self.resolution)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

impl SimulationSet {
    /// Open `source` and record the run count, resolution and extent of
    /// its `hmax` stack.
    pub fn new<S: StackSource + 'static>(name: DatasetName, source: S) -> Result<Self> {
        let hmax = source.open_stack(Qoi::Hmax)?;
        let size = hmax.band_count();
        let resolution = hmax.resolution();
        let bounds = hmax.bounds();
        tracing::info!(%name, size, resolution, "loaded simulation set");

        Ok(Self {
            name,
            source: Box::new(source),
            size,
            resolution,
            bounds,
        })
    }

    pub fn name(&self) -> DatasetName {
        self.name
    }

    /// Number of simulation runs
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Read one quantity's stack and check it has one band per run.
    pub fn open(&self, qoi: Qoi) -> Result<RasterStack> {
        let stack = self.source.open_stack(qoi)?;
        if stack.band_count() != self.size {
            return Err(Error::DimensionMismatch {
                what: "band count",
                expected: self.size,
                actual: stack.band_count(),
            });
        }
        Ok(stack)
    }

    /// Impacted area per run (km²), from `hmax`
    pub fn calc_ia(&self, threshold: f64) -> Result<Vec<f64>> {
        Threshold::new(threshold)?;
        compute_area(&self.open(Qoi::Hmax)?, threshold)
    }

    /// Deposit area per run (km²), from `hfin`
    pub fn calc_da(&self, threshold: f64) -> Result<Vec<f64>> {
        Threshold::new(threshold)?;
        compute_area(&self.open(Qoi::Hfin)?, threshold)
    }

    /// Deposit volume per run (10⁶ m³), from `hfin`
    pub fn calc_dv(&self, threshold: f64) -> Result<Vec<f64>> {
        Threshold::new(threshold)?;
        compute_volume(&self.open(Qoi::Hfin)?, threshold)
    }

    /// Value of `qoi` at (`x`, `y`) for every run.
    ///
    /// The quantity and the coordinate are checked before any raster is
    /// read.
    pub fn extract_qoi_at(&self, qoi: Qoi, x: f64, y: f64) -> Result<Vec<f64>> {
        qoi.require_field()?;
        let loc = Location::new(x, y)?;
        self.bounds.check_strict(loc.x, loc.y)?;
        extract_point(&self.open(qoi)?, loc.x, loc.y)
    }

    /// All five scalar outputs per run.
    ///
    /// Threshold and location are validated before any I/O.
    pub fn curate_scalars(&self, settings: &CurationSettings) -> Result<ScalarFeatureTable> {
        let loc = settings.location;
        self.bounds.check_strict(loc.x, loc.y)?;
        let threshold = settings.threshold.value();

        let hfin = self.open(Qoi::Hfin)?;
        let table = ScalarFeatureTable::from_columns([
            (ScalarKind::Ia, self.calc_ia(threshold)?),
            (ScalarKind::Da, compute_area(&hfin, threshold)?),
            (ScalarKind::Dv, compute_volume(&hfin, threshold)?),
            (ScalarKind::Vmax, self.extract_qoi_at(Qoi::Vmax, loc.x, loc.y)?),
            (ScalarKind::Hmax, self.extract_qoi_at(Qoi::Hmax, loc.x, loc.y)?),
        ])?;
        tracing::debug!(name = %self.name, runs = table.rows(), "curated scalar outputs");
        Ok(table)
    }

    /// Flatten `qoi` to its active cells (see [`flatten_with_mask`]).
    pub fn create_vector(
        &self,
        qoi: Qoi,
        threshold: f64,
        mask: Option<&ValidColumnMask>,
    ) -> Result<FlattenedStack> {
        qoi.require_field()?;
        Threshold::new(threshold)?;
        flatten_with_mask(&self.open(qoi)?, threshold, mask)
    }

    /// Widest cross-section per run of `qoi`
    pub fn lateral_spread(&self, qoi: Qoi, threshold: f64) -> Result<Vec<LateralSpread>> {
        Threshold::new(threshold)?;
        lateral_spread(&self.open(qoi)?, threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use flowuq_core::{GeoTransform, MemorySource};
    use ndarray::Array2;
    use std::cell::Cell;
    use std::rc::Rc;

    fn stack(values: &[f64]) -> RasterStack {
        let bands = values.iter().map(|&v| Array2::from_elem((4, 4), v)).collect();
        RasterStack::from_bands(bands, GeoTransform::new(0.0, 40.0, 10.0, -10.0)).unwrap()
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with(Qoi::Hmax, stack(&[1.0, 0.0, 0.5]))
            .with(Qoi::Hfin, stack(&[2.0, 0.0, 0.05]))
            .with(Qoi::Vmax, stack(&[3.0, 0.0, 2.0]))
            .with(Qoi::Pmax, stack(&[10.0, 0.0, 4.0]))
    }

    /// Counts how many stacks are read.
    struct Counting {
        inner: MemorySource,
        opened: Rc<Cell<usize>>,
    }

    impl StackSource for Counting {
        fn open_stack(&self, qoi: Qoi) -> Result<RasterStack> {
            self.opened.set(self.opened.get() + 1);
            self.inner.open_stack(qoi)
        }
    }

    #[test]
    fn test_metadata() {
        let sims = SimulationSet::new(DatasetName::Synth, source()).unwrap();
        assert_eq!(sims.size(), 3);
        assert_eq!(sims.resolution(), 10.0);
        assert_eq!(sims.bounds().right, 40.0);
    }

    #[test]
    fn test_curate_scalars() {
        let sims = SimulationSet::new(DatasetName::Synth, source()).unwrap();
        let settings = CurationSettings::new(0.1, 15.0, 25.0).unwrap();
        let table = sims.curate_scalars(&settings).unwrap();

        assert_eq!(table.rows(), 3);
        assert_relative_eq!(table.get(ScalarKind::Ia).unwrap()[0], 0.0016);
        assert_eq!(table.get(ScalarKind::Ia).unwrap()[1], 0.0);
        assert_eq!(table.get(ScalarKind::Da).unwrap()[2], 0.0);
        // 16 cells × 2 m × 100 m² = 3200 m³
        assert_relative_eq!(table.get(ScalarKind::Dv).unwrap()[0], 0.003);
        assert_eq!(table.get(ScalarKind::Vmax).unwrap(), &[3.0, 0.0, 2.0]);
        assert_eq!(table.get(ScalarKind::Hmax).unwrap(), &[1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_curate_rejects_outside_point_before_reading() {
        let opened = Rc::new(Cell::new(0));
        let sims = SimulationSet::new(
            DatasetName::Synth,
            Counting {
                inner: source(),
                opened: Rc::clone(&opened),
            },
        )
        .unwrap();
        assert_eq!(opened.get(), 1);

        let settings = CurationSettings::new(0.1, 15.0, 40.0).unwrap();
        assert!(matches!(
            sims.curate_scalars(&settings),
            Err(Error::OutOfBounds { axis: "y", .. })
        ));
        assert!(sims.extract_qoi_at(Qoi::Hmax, -5.0, 20.0).is_err());
        assert!(sims.calc_ia(-1.0).is_err());
        assert_eq!(opened.get(), 1);
    }

    #[test]
    fn test_extract_rejects_hfin() {
        let sims = SimulationSet::new(DatasetName::Synth, source()).unwrap();
        assert!(matches!(
            sims.extract_qoi_at(Qoi::Hfin, 15.0, 25.0),
            Err(Error::InvalidParameter { .. })
        ));
        assert_eq!(sims.extract_qoi_at(Qoi::Pmax, 15.0, 25.0).unwrap(), vec![10.0, 0.0, 4.0]);
    }

    #[test]
    fn test_band_count_mismatch() {
        let src = source().with(Qoi::Vmax, stack(&[1.0]));
        let sims = SimulationSet::new(DatasetName::Synth, src).unwrap();
        assert!(matches!(
            sims.extract_qoi_at(Qoi::Vmax, 15.0, 25.0),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_create_vector() {
        let sims = SimulationSet::new(DatasetName::Synth, source()).unwrap();
        let flat = sims.create_vector(Qoi::Hmax, 0.1, None).unwrap();
        assert_eq!(flat.values.dim(), (3, 16));
        assert!(sims.create_vector(Qoi::Hfin, 0.1, None).is_err());
    }
}
