//! A [`StackSource`] for catalogs that mix local files and URLs.

use flowuq_core::{
    Catalog, DatasetName, Qoi, QoiLocations, RasterLocation, RasterStack, Result, StackSource,
};

use crate::blocking::FigshareClientBlocking;
use crate::figshare::FigshareOptions;

/// Reads local stacks from disk and downloads remote ones on every request.
///
/// Downloads are not cached: each calculation fetches its stack and drops it
/// when done.
pub struct CatalogSource {
    locations: QoiLocations,
    client: FigshareClientBlocking,
}

impl CatalogSource {
    pub fn new(locations: QoiLocations, options: FigshareOptions) -> Result<Self> {
        let client = FigshareClientBlocking::new(options)?;
        Ok(Self { locations, client })
    }

    /// Locations of `name` as listed in `catalog`.
    pub fn from_catalog(catalog: &Catalog, name: DatasetName, options: FigshareOptions) -> Result<Self> {
        Self::new(catalog.locations(name)?.clone(), options)
    }

    /// Resolve `name` against its Figshare article.
    pub fn figshare(name: DatasetName, options: FigshareOptions) -> Result<Self> {
        let client = FigshareClientBlocking::new(options)?;
        let locations = client.resolve(name)?;
        Ok(Self { locations, client })
    }

    pub fn locations(&self) -> &QoiLocations {
        &self.locations
    }
}

impl std::fmt::Debug for CatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogSource")
            .field("locations", &self.locations)
            .finish_non_exhaustive()
    }
}

impl StackSource for CatalogSource {
    fn open_stack(&self, qoi: Qoi) -> Result<RasterStack> {
        match self.locations.get(qoi)? {
            RasterLocation::Local(path) => {
                tracing::debug!(%qoi, path = %path.display(), "opening local stack");
                flowuq_core::io::read_stack(path)
            }
            RasterLocation::Remote(url) => {
                tracing::debug!(%qoi, %url, "fetching remote stack");
                Ok(self.client.fetch_stack(url)?)
            }
        }
    }
}
