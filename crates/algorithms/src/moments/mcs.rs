//! Monte Carlo moments through a scalar emulator

use flowuq_core::{Analysis, Catalog, DatasetName, DesignMatrix, Error, Result};

use super::{MomentSummary, COV_SCENARIOS};
use crate::emulator::{Emulator, ScalarEmulator};
use crate::scalars::ScalarKind;

/// Read the three MCS input designs of `name` from the catalog's input
/// directory, in scenario order.
pub fn load_mcs_inputs(catalog: &Catalog, name: DatasetName) -> Result<Vec<DesignMatrix>> {
    name.require_base()?;
    (1..=COV_SCENARIOS.len() as u8)
        .map(|i| DesignMatrix::from_csv_path(catalog.input_path(name, Analysis::Mcs(i))))
        .collect()
}

/// Moments of emulator predictions, one entry per input set.
///
/// Every input set is shape-checked and the requested models are trained
/// (or reused) before the first prediction.
pub fn compute_mcs_moments(
    emulator: &mut ScalarEmulator,
    input_sets: &[DesignMatrix],
    scalars: &[ScalarKind],
) -> Result<MomentSummary> {
    if input_sets.is_empty() {
        return Err(Error::invalid("input_sets", 0, "at least one input set is required"));
    }
    for design in input_sets {
        emulator.check_design(design)?;
    }
    emulator.train(scalars)?;

    let mut summary = MomentSummary::new();
    for &scalar in scalars {
        for (scenario, design) in input_sets.iter().enumerate() {
            let pred = emulator.predict_scalar(scalar, design)?;
            let samples = pred.mean.to_vec();
            tracing::debug!(%scalar, scenario, samples = samples.len(), "MCS scenario");
            summary.push_scenario(scalar, &samples);
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::GpParams;
    use crate::moments::MomentKind;
    use crate::scalars::ScalarFeatureTable;
    use ndarray::{Array1, Array2, Axis};

    fn emulator() -> ScalarEmulator {
        let x = Array1::linspace(0.0, 1.0, 10);
        let design = DesignMatrix::from_array(x.clone().insert_axis(Axis(1))).unwrap();
        let outputs = ScalarFeatureTable::from_columns([
            (ScalarKind::Ia, x.mapv(|v| 2.0 * v + 1.0).to_vec()),
            (ScalarKind::Hmax, x.mapv(|v| v * v).to_vec()),
        ])
        .unwrap();
        ScalarEmulator::new(DatasetName::Synth, design, outputs, GpParams::default()).unwrap()
    }

    fn inputs(spread: f64) -> DesignMatrix {
        let x = Array1::linspace(0.5 - spread, 0.5 + spread, 21);
        DesignMatrix::from_array(x.insert_axis(Axis(1))).unwrap()
    }

    #[test]
    fn test_moments_per_scenario() {
        let mut emu = emulator();
        let sets = [inputs(0.05), inputs(0.125), inputs(0.25)];
        let summary =
            compute_mcs_moments(&mut emu, &sets, &[ScalarKind::Ia, ScalarKind::Hmax]).unwrap();

        let means = summary.get(MomentKind::Mean, ScalarKind::Ia).unwrap();
        assert_eq!(means.len(), 3);
        for m in means {
            assert!((m - 2.0).abs() < 0.01, "mean = {m}");
        }
        let vars = summary.get(MomentKind::Var, ScalarKind::Ia).unwrap();
        assert!(vars[0] < vars[1] && vars[1] < vars[2]);
        assert!(emu.is_trained(ScalarKind::Hmax));
        assert!(!emu.is_trained(ScalarKind::Dv));
    }

    #[test]
    fn test_rejects_bad_input_sets_before_training() {
        let mut emu = emulator();
        let wide = DesignMatrix::from_array(Array2::zeros((4, 2))).unwrap();
        assert!(matches!(
            compute_mcs_moments(&mut emu, &[inputs(0.1), wide], &[ScalarKind::Ia]),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(!emu.is_trained(ScalarKind::Ia));
        assert!(compute_mcs_moments(&mut emu, &[], &[ScalarKind::Ia]).is_err());
    }
}
