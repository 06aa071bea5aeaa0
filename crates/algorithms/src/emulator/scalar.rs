//! Emulators for scalar outputs

use std::borrow::Cow;
use std::collections::BTreeMap;

use ndarray::{Array1, Axis};
use serde::Serialize;

use flowuq_core::{DatasetName, DesignMatrix, Error, Result};

use super::{Emulator, GaussianProcess, GpParams, LooMetrics};
use crate::scalars::{ScalarFeatureTable, ScalarKind};
use crate::simulations::{CurationSettings, SimulationSet};

/// Prediction of one scalar at m input rows
#[derive(Debug, Clone, Serialize)]
pub struct ScalarPrediction {
    pub mean: Array1<f64>,
    pub lower95: Array1<f64>,
    pub upper95: Array1<f64>,
    pub sd: Array1<f64>,
}

/// Independent Gaussian-process models of the scalar outputs of a dataset.
///
/// Models are fitted lazily: [`ScalarEmulator::train`] caches them, and
/// any uncached scalar is fitted on demand.
#[derive(Debug, Clone)]
pub struct ScalarEmulator {
    name: DatasetName,
    design: DesignMatrix,
    outputs: ScalarFeatureTable,
    params: GpParams,
    models: BTreeMap<ScalarKind, GaussianProcess>,
}

impl Emulator for ScalarEmulator {
    fn design(&self) -> &DesignMatrix {
        &self.design
    }

    fn gp_params(&self) -> &GpParams {
        &self.params
    }
}

impl ScalarEmulator {
    /// Pair a training design with its curated outputs.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] if the table's run count differs from
    /// the design's row count.
    pub fn new(
        name: DatasetName,
        design: DesignMatrix,
        outputs: ScalarFeatureTable,
        params: GpParams,
    ) -> Result<Self> {
        params.validate()?;
        if outputs.rows() != design.rows() {
            return Err(Error::DimensionMismatch {
                what: "training runs",
                expected: design.rows(),
                actual: outputs.rows(),
            });
        }
        Ok(Self {
            name,
            design,
            outputs,
            params,
            models: BTreeMap::new(),
        })
    }

    /// Curate the scalar outputs of `sims` and pair them with `design`.
    pub fn from_simulations(
        sims: &SimulationSet,
        settings: &CurationSettings,
        design: DesignMatrix,
        params: GpParams,
    ) -> Result<Self> {
        sims.name().require_base()?;
        if design.rows() != sims.size() {
            return Err(Error::DimensionMismatch {
                what: "training runs",
                expected: sims.size(),
                actual: design.rows(),
            });
        }
        let outputs = sims.curate_scalars(settings)?;
        Self::new(sims.name(), design, outputs, params)
    }

    pub fn name(&self) -> DatasetName {
        self.name
    }

    /// Curated training outputs
    pub fn outputs(&self) -> &ScalarFeatureTable {
        &self.outputs
    }

    /// Fit a fresh model of `scalar`.
    pub fn model(&self, scalar: ScalarKind) -> Result<GaussianProcess> {
        let response = self.outputs.column(scalar)?.insert_axis(Axis(1));
        tracing::debug!(name = %self.name, %scalar, "fitting scalar emulator");
        self.fit(response.view())
    }

    /// Fit and cache models for `scalars`; already cached ones are kept.
    pub fn train(&mut self, scalars: &[ScalarKind]) -> Result<()> {
        for &scalar in scalars {
            if !self.models.contains_key(&scalar) {
                let model = self.model(scalar)?;
                self.models.insert(scalar, model);
            }
        }
        Ok(())
    }

    pub fn is_trained(&self, scalar: ScalarKind) -> bool {
        self.models.contains_key(&scalar)
    }

    fn model_for(&self, scalar: ScalarKind) -> Result<Cow<'_, GaussianProcess>> {
        match self.models.get(&scalar) {
            Some(model) => Ok(Cow::Borrowed(model)),
            None => self.model(scalar).map(Cow::Owned),
        }
    }

    /// Predict `scalar` at every row of `design`.
    pub fn predict_scalar(
        &self,
        scalar: ScalarKind,
        design: &DesignMatrix,
    ) -> Result<ScalarPrediction> {
        self.check_design(design)?;
        let pred = self.model_for(scalar)?.predict(design.view())?;
        Ok(ScalarPrediction {
            mean: pred.mean.column(0).to_owned(),
            lower95: pred.lower.column(0).to_owned(),
            upper95: pred.upper.column(0).to_owned(),
            sd: pred.sd.column(0).to_owned(),
        })
    }

    /// Leave-one-out R², MAPE (%) and NRMSE (%) of `scalar`.
    pub fn cross_validate_loo(&self, scalar: ScalarKind) -> Result<LooMetrics> {
        let loo = self.model_for(scalar)?.leave_one_out()?;
        let truth = self.outputs.column(scalar)?;
        let metrics = LooMetrics::compute(truth.view(), loo.mean.column(0))?;
        tracing::info!(
            name = %self.name,
            %scalar,
            r2 = metrics.r2,
            mape = metrics.mape,
            nrmse = metrics.nrmse,
            "leave-one-out cross-validation"
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Deterministic points in the unit cube from an LCG
    fn lcg_design(n: usize, p: usize, seed: u64) -> DesignMatrix {
        let mut rng = seed;
        let data = Array2::from_shape_simple_fn((n, p), || {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 33) as f64 / (1u64 << 31) as f64
        });
        DesignMatrix::from_array(data).unwrap()
    }

    fn response(design: &DesignMatrix) -> Vec<f64> {
        design
            .view()
            .outer_iter()
            .map(|x| 2.0 * x[0] + x[1] * x[1] + 0.5 * (3.0 * x[2]).sin() + 1.0)
            .collect()
    }

    fn emulator(n: usize) -> ScalarEmulator {
        let design = lcg_design(n, 3, 7);
        let outputs = ScalarFeatureTable::from_columns([
            (ScalarKind::Ia, response(&design)),
            (ScalarKind::Dv, vec![0.5; n]),
        ])
        .unwrap();
        ScalarEmulator::new(DatasetName::Synth, design, outputs, GpParams::default()).unwrap()
    }

    #[test]
    fn test_rejects_misaligned_outputs() {
        let design = lcg_design(5, 3, 1);
        let outputs = ScalarFeatureTable::from_columns([(ScalarKind::Ia, vec![0.0; 4])]).unwrap();
        assert!(matches!(
            ScalarEmulator::new(DatasetName::Synth, design, outputs, GpParams::default()),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_predict_scalar_shapes_and_bounds() {
        let emu = emulator(20);
        let new = lcg_design(6, 3, 99);
        let pred = emu.predict_scalar(ScalarKind::Ia, &new).unwrap();
        assert_eq!(pred.mean.len(), 6);
        for i in 0..6 {
            assert!(pred.lower95[i] <= pred.mean[i] && pred.mean[i] <= pred.upper95[i]);
        }
        assert!(matches!(
            emu.predict_scalar(ScalarKind::Ia, &lcg_design(6, 4, 1)),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(emu.predict_scalar(ScalarKind::Hmax, &new).is_err());
    }

    #[test]
    fn test_train_caches_models() {
        let mut emu = emulator(10);
        assert!(!emu.is_trained(ScalarKind::Ia));
        emu.train(&[ScalarKind::Ia]).unwrap();
        assert!(emu.is_trained(ScalarKind::Ia));
        assert!(!emu.is_trained(ScalarKind::Dv));

        let new = lcg_design(3, 3, 5);
        let cached = emu.predict_scalar(ScalarKind::Ia, &new).unwrap();
        let fresh = emu.model(ScalarKind::Ia).unwrap().predict(new.view()).unwrap();
        assert_eq!(cached.mean, fresh.mean.column(0));
    }

    #[test]
    fn test_loo_on_smooth_response() {
        let emu = emulator(40);
        let metrics = emu.cross_validate_loo(ScalarKind::Ia).unwrap();
        assert!(metrics.r2 > 0.9, "r2 = {}", metrics.r2);
        assert!(metrics.mape < 10.0, "mape = {}", metrics.mape);
        assert!(metrics.nrmse < 10.0, "nrmse = {}", metrics.nrmse);
    }

    #[test]
    fn test_loo_on_constant_output() {
        let emu = emulator(8);
        let metrics = emu.cross_validate_loo(ScalarKind::Dv).unwrap();
        assert!(metrics.mape < 0.1, "mape = {}", metrics.mape);
    }
}
