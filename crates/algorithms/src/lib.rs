//! # FlowUQ Algorithms
//!
//! Uncertainty-quantification pipeline for ensembles of mass-flow
//! simulations.
//!
//! ## Components
//!
//! - **features**: impacted/deposit area, deposit volume, point extraction,
//!   active-cell masks, lateral spread
//! - **simulations**: named simulation sets and scalar curation
//! - **emulator**: Gaussian-process scalar and field emulators, LOO and
//!   validation metrics
//! - **moments**: Monte Carlo and point-estimate moments and their comparison

pub mod emulator;
pub mod features;
pub(crate) mod maybe_rayon;
pub mod moments;
pub mod scalars;
pub mod simulations;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::emulator::{
        Emulator, GaussianProcess, GpParams, GpPrediction, LooMetrics, ScalarEmulator,
        ScalarPrediction, ValidationReport, VectorEmulator,
    };
    pub use crate::features::{
        compute_area, compute_volume, extract_point, flatten_with_mask, lateral_spread,
        FieldStatistics, FlattenedStack, LateralSpread, Threshold, ValidColumnMask,
    };
    pub use crate::moments::{
        compare, compute_mcs_moments, compute_pem_moments, pem_field_moments, MomentKind,
        MomentSummary, PemLayout,
    };
    pub use crate::scalars::{ScalarFeatureTable, ScalarKind};
    pub use crate::simulations::{CurationSettings, SimulationSet};
    pub use flowuq_core::prelude::*;
}
