//! # FlowUQ Core
//!
//! Core types, configuration and I/O shared by the FlowUQ crates.
//!
//! This crate provides:
//! - `RasterStack`: one band per simulation run, sharing a `GeoTransform`
//! - `Raster<T>`: a single georeferenced grid (reconstructed fields, masks)
//! - GeoTIFF stack I/O without GDAL
//! - `DesignMatrix`: sampled physical parameters loaded from CSV
//! - `Catalog`: dataset names, quantities of interest and their locations
//! - `StackSource`: transient, per-calculation access to stacks

pub mod catalog;
pub mod design;
pub mod error;
pub mod io;
pub mod raster;
pub mod source;

pub use catalog::{Analysis, Catalog, DatasetName, Location, Qoi, QoiLocations, RasterLocation};
pub use design::DesignMatrix;
pub use error::{Error, Result};
pub use raster::{Bounds, GeoTransform, Raster, RasterElement, RasterStack};
pub use source::{LocalSource, MemorySource, StackSource};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::catalog::{DatasetName, Location, Qoi};
    pub use crate::design::DesignMatrix;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{Bounds, GeoTransform, Raster, RasterStack};
    pub use crate::source::StackSource;
}
