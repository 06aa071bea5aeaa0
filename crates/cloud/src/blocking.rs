//! Blocking wrapper for synchronous callers.

use flowuq_core::{DatasetName, QoiLocations, RasterStack};

use crate::error::{CloudError, Result};
use crate::figshare::{FigshareClient, FigshareOptions};
use crate::models::{FigshareFile, FileIndex};

/// [`FigshareClient`] driven by an internal single-threaded Tokio runtime.
///
/// Must not be used from inside another Tokio runtime.
pub struct FigshareClientBlocking {
    rt: tokio::runtime::Runtime,
    inner: FigshareClient,
}

impl FigshareClientBlocking {
    pub fn new(options: FigshareOptions) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CloudError::Network(e.to_string()))?;
        let inner = FigshareClient::new(options)?;
        Ok(Self { rt, inner })
    }

    pub fn list_files(&self, article: u64) -> Result<Vec<FigshareFile>> {
        self.rt.block_on(self.inner.list_files(article))
    }

    pub fn index(&self, name: DatasetName) -> Result<FileIndex> {
        self.rt.block_on(self.inner.index(name))
    }

    pub fn resolve(&self, name: DatasetName) -> Result<QoiLocations> {
        self.rt.block_on(self.inner.resolve(name))
    }

    pub fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.rt.block_on(self.inner.download(url))
    }

    pub fn fetch_stack(&self, url: &str) -> Result<RasterStack> {
        self.rt.block_on(self.inner.fetch_stack(url))
    }
}
