//! Emulator for whole output fields

use ndarray::{Array2, ArrayView2};

use flowuq_core::{DatasetName, DesignMatrix, Error, GeoTransform, Qoi, Result};

use super::{Emulator, GaussianProcess, GpParams, GpPrediction, ValidationReport};
use crate::features::{FieldStatistics, FlattenedStack, Threshold, ValidColumnMask};
use crate::simulations::SimulationSet;

/// A multi-output Gaussian process over the active cells of a field.
///
/// Training data are the flattened runs (runs × active cells). The mask
/// that selected the cells is kept so that validation data and predictions
/// can be mapped back onto the grid.
#[derive(Debug, Clone)]
pub struct VectorEmulator {
    name: DatasetName,
    qoi: Qoi,
    threshold: Threshold,
    design: DesignMatrix,
    response: Array2<f64>,
    mask: ValidColumnMask,
    transform: GeoTransform,
    params: GpParams,
    model: Option<GaussianProcess>,
}

impl Emulator for VectorEmulator {
    fn design(&self) -> &DesignMatrix {
        &self.design
    }

    fn gp_params(&self) -> &GpParams {
        &self.params
    }
}

impl VectorEmulator {
    /// Pair a training design with a flattened field.
    pub fn new(
        name: DatasetName,
        qoi: Qoi,
        threshold: f64,
        design: DesignMatrix,
        flattened: FlattenedStack,
        transform: GeoTransform,
        params: GpParams,
    ) -> Result<Self> {
        qoi.require_field()?;
        let threshold = Threshold::new(threshold)?;
        params.validate()?;
        if flattened.values.nrows() != design.rows() {
            return Err(Error::DimensionMismatch {
                what: "training runs",
                expected: design.rows(),
                actual: flattened.values.nrows(),
            });
        }
        if flattened.values.ncols() == 0 {
            return Err(Error::Algorithm(format!(
                "no cell of {qoi} reaches the threshold {}",
                threshold.value()
            )));
        }
        Ok(Self {
            name,
            qoi,
            threshold,
            design,
            response: flattened.values,
            mask: flattened.mask,
            transform,
            params,
            model: None,
        })
    }

    /// Flatten `qoi` of `sims` and pair it with `design`.
    ///
    /// Arguments are validated before any raster is read.
    pub fn from_simulations(
        sims: &SimulationSet,
        qoi: Qoi,
        threshold: f64,
        design: DesignMatrix,
        params: GpParams,
    ) -> Result<Self> {
        sims.name().require_base()?;
        qoi.require_field()?;
        Threshold::new(threshold)?;
        if design.rows() != sims.size() {
            return Err(Error::DimensionMismatch {
                what: "training runs",
                expected: sims.size(),
                actual: design.rows(),
            });
        }

        let stack = sims.open(qoi)?;
        let transform = *stack.transform();
        let flattened = crate::features::flatten_with_mask(&stack, threshold, None)?;
        tracing::info!(
            name = %sims.name(),
            %qoi,
            runs = design.rows(),
            active = flattened.values.ncols(),
            "prepared field emulator"
        );
        Self::new(sims.name(), qoi, threshold, design, flattened, transform, params)
    }

    pub fn name(&self) -> DatasetName {
        self.name
    }

    pub fn qoi(&self) -> Qoi {
        self.qoi
    }

    pub fn threshold(&self) -> f64 {
        self.threshold.value()
    }

    /// Training mask
    pub fn mask(&self) -> &ValidColumnMask {
        &self.mask
    }

    /// Training data (runs × active cells)
    pub fn response(&self) -> &Array2<f64> {
        &self.response
    }

    /// Grid shape as (rows, cols)
    pub fn grid_shape(&self) -> (usize, usize) {
        self.mask.shape()
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Fit the model; a previous fit is replaced.
    pub fn train(&mut self) -> Result<()> {
        tracing::debug!(name = %self.name, qoi = %self.qoi, "fitting field emulator");
        self.model = Some(self.fit(self.response.view())?);
        Ok(())
    }

    fn trained(&self) -> Result<&GaussianProcess> {
        self.model.as_ref().ok_or(Error::NotTrained("vector emulator"))
    }

    /// Flatten the same quantity of `sims` with the training mask.
    pub fn validation_data(&self, sims: &SimulationSet) -> Result<Array2<f64>> {
        Ok(sims
            .create_vector(self.qoi, self.threshold.value(), Some(&self.mask))?
            .values)
    }

    /// Raw predictions over the active cells (m × active).
    pub fn predict(&self, design: &DesignMatrix) -> Result<GpPrediction> {
        self.check_design(design)?;
        let model = self.trained()?;
        model.predict(design.view())
    }

    /// Per-cell mean and standard deviation across the predicted runs,
    /// mapped onto the full grid; inactive cells are zero.
    pub fn predict_vector(&self, design: &DesignMatrix) -> Result<FieldStatistics> {
        let pred = self.predict(design)?;
        self.mask.field_statistics(pred.mean.view(), self.transform)
    }

    /// Score predictions at `design` against `truth` (m × active).
    pub fn validate(
        &self,
        design: &DesignMatrix,
        truth: ArrayView2<'_, f64>,
    ) -> Result<ValidationReport> {
        let pred = self.predict(design)?;
        let report = ValidationReport::compute(
            truth,
            pred.mean.view(),
            pred.lower.view(),
            pred.upper.view(),
        )?;
        tracing::info!(
            name = %self.name,
            qoi = %self.qoi,
            pci95 = report.pci95,
            lci95 = report.lci95,
            mse = report.mean_sq_err,
            "validated field emulator"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flatten_with_mask;
    use flowuq_core::RasterStack;
    use ndarray::Array2;

    fn unit_design(n: usize, p: usize, seed: u64) -> DesignMatrix {
        let mut rng = seed;
        let data = Array2::from_shape_simple_fn((n, p), || {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 33) as f64 / (1u64 << 31) as f64
        });
        DesignMatrix::from_array(data).unwrap()
    }

    /// One band per design row on a 5×10 grid: a bump whose height and
    /// reach grow with the inputs. Every cell is active somewhere.
    fn field_stack(design: &DesignMatrix) -> RasterStack {
        let bands = design
            .view()
            .outer_iter()
            .map(|x| {
                Array2::from_shape_fn((5, 10), |(r, c)| {
                    let d = ((r as f64 - 2.0).powi(2) + (c as f64 - 4.5).powi(2)).sqrt();
                    (1.0 + x[0] + 0.5 * x[1]) * (-d / (2.0 + 3.0 * x[2])).exp()
                })
            })
            .collect();
        RasterStack::from_bands(bands, GeoTransform::new(0.0, 50.0, 10.0, -10.0)).unwrap()
    }

    fn emulator() -> VectorEmulator {
        let design = unit_design(16, 3, 11);
        let stack = field_stack(&design);
        let flat = flatten_with_mask(&stack, 0.0, None).unwrap();
        assert_eq!(flat.values.dim(), (16, 50));
        VectorEmulator::new(
            DatasetName::Synth,
            Qoi::Hmax,
            0.0,
            design,
            flat,
            *stack.transform(),
            GpParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_predict_requires_training() {
        let emu = emulator();
        assert!(matches!(
            emu.predict(&unit_design(2, 3, 1)),
            Err(Error::NotTrained(_))
        ));
    }

    #[test]
    fn test_predict_checks_design_before_training() {
        let emu = emulator();
        assert!(matches!(
            emu.predict(&unit_design(2, 4, 1)),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_prediction_shapes() {
        let mut emu = emulator();
        emu.train().unwrap();
        let pred = emu.predict(&unit_design(8, 3, 5)).unwrap();
        assert_eq!(pred.mean.dim(), (8, 50));
        assert_eq!(pred.sd.dim(), (8, 50));
        assert!(matches!(
            emu.predict(&unit_design(8, 4, 5)),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_predict_vector_grid() {
        let mut emu = emulator();
        emu.train().unwrap();
        let field = emu.predict_vector(&unit_design(4, 3, 3)).unwrap();
        assert_eq!(field.mean.shape(), (5, 10));
        assert_eq!(field.std.shape(), (5, 10));
        assert!(field.std.data().iter().all(|&s| s >= 0.0));
        // the bump peaks at the centre of the grid
        assert!(field.mean.data()[[2, 4]] > field.mean.data()[[0, 0]]);
    }

    #[test]
    fn test_validate_against_fresh_runs() {
        let mut emu = emulator();
        emu.train().unwrap();
        let design = unit_design(6, 3, 42);
        let truth_stack = field_stack(&design);
        let truth = flatten_with_mask(&truth_stack, 0.0, Some(emu.mask())).unwrap();

        let report = emu.validate(&design, truth.values.view()).unwrap();
        assert!((0.0..=1.0).contains(&report.pci95));
        assert!(report.lci95 >= 0.0);
        assert!(report.mean_sq_err < 0.1, "mse = {}", report.mean_sq_err);
        assert!(report.validation.iter().all(|&v| v >= 0.0));
        assert_eq!(report.validation.dim(), (6, 50));

        let wrong = Array2::zeros((6, 49));
        assert!(emu.validate(&design, wrong.view()).is_err());
    }

    #[test]
    fn test_rejects_hfin_and_empty_fields() {
        let design = unit_design(4, 2, 1);
        let stack = RasterStack::from_bands(
            vec![Array2::zeros((2, 2)); 4],
            GeoTransform::default(),
        )
        .unwrap();
        let flat = flatten_with_mask(&stack, 0.1, None).unwrap();
        assert!(VectorEmulator::new(
            DatasetName::Synth,
            Qoi::Hfin,
            0.1,
            design.clone(),
            flat.clone(),
            GeoTransform::default(),
            GpParams::default(),
        )
        .is_err());
        assert!(matches!(
            VectorEmulator::new(
                DatasetName::Synth,
                Qoi::Hmax,
                0.1,
                design,
                flat,
                GeoTransform::default(),
                GpParams::default(),
            ),
            Err(Error::Algorithm(_))
        ));
    }
}
