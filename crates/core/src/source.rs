//! Providers of simulation stacks
//!
//! A [`StackSource`] hands out a freshly read [`RasterStack`] per request.
//! Nothing is kept open between calls, so every calculation acquires and
//! releases its raster on its own.

use std::collections::BTreeMap;

use crate::catalog::{Qoi, QoiLocations, RasterLocation};
use crate::error::{Error, Result};
use crate::io::read_stack;
use crate::raster::RasterStack;

/// Something that can produce the raster stack of a quantity of interest.
pub trait StackSource {
    /// Read the full stack for `qoi`.
    fn open_stack(&self, qoi: Qoi) -> Result<RasterStack>;
}

impl<S: StackSource + ?Sized> StackSource for Box<S> {
    fn open_stack(&self, qoi: Qoi) -> Result<RasterStack> {
        (**self).open_stack(qoi)
    }
}

/// Reads stacks from local GeoTIFF files.
#[derive(Debug, Clone)]
pub struct LocalSource {
    locations: QoiLocations,
}

impl LocalSource {
    pub fn new(locations: QoiLocations) -> Self {
        Self { locations }
    }
}

impl StackSource for LocalSource {
    fn open_stack(&self, qoi: Qoi) -> Result<RasterStack> {
        match self.locations.get(qoi)? {
            RasterLocation::Local(path) => {
                tracing::debug!(%qoi, path = %path.display(), "opening local stack");
                read_stack(path)
            }
            RasterLocation::Remote(url) => Err(Error::Config(format!(
                "{qoi} points at remote location {url}; use a remote-capable source"
            ))),
        }
    }
}

/// Serves stacks already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    stacks: BTreeMap<Qoi, RasterStack>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion
    pub fn with(mut self, qoi: Qoi, stack: RasterStack) -> Self {
        self.stacks.insert(qoi, stack);
        self
    }

    pub fn insert(&mut self, qoi: Qoi, stack: RasterStack) {
        self.stacks.insert(qoi, stack);
    }
}

impl StackSource for MemorySource {
    fn open_stack(&self, qoi: Qoi) -> Result<RasterStack> {
        self.stacks
            .get(&qoi)
            .cloned()
            .ok_or_else(|| Error::Config(format!("no stack loaded for {qoi}")))
    }
}
