//! Async client for the public Figshare API.
//!
//! Each dataset is published as one Figshare article holding a
//! `<qoi>_stack.tif` file per quantity of interest.

use std::time::Duration;

use flowuq_core::{DatasetName, QoiLocations, RasterStack};

use crate::error::{CloudError, Result};
use crate::models::{FigshareFile, FileIndex};

/// Public Figshare REST endpoint
pub const FIGSHARE_API: &str = "https://api.figshare.com/v2";

/// Figshare article holding the stacks of `name`.
pub fn article_id(name: DatasetName) -> u64 {
    match name {
        DatasetName::Synth => 20449395,
        DatasetName::SynthPem => 20454924,
        DatasetName::SynthValidate => 20454933,
        DatasetName::Acheron => 20449410,
        DatasetName::AcheronPem => 20454927,
        DatasetName::AcheronValidate => 20454936,
    }
}

/// Configuration for [`FigshareClient`].
#[derive(Debug, Clone)]
pub struct FigshareOptions {
    /// API root, without trailing slash (default [`FIGSHARE_API`]).
    pub api_base: String,
    /// Per-request timeout (default 120 s; stacks are tens of MB).
    pub request_timeout: Duration,
}

impl Default for FigshareOptions {
    fn default() -> Self {
        Self {
            api_base: FIGSHARE_API.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Async Figshare client.
pub struct FigshareClient {
    client: reqwest::Client,
    options: FigshareOptions,
}

impl FigshareClient {
    pub fn new(options: FigshareOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| CloudError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &FigshareOptions {
        &self.options
    }

    /// `GET {api_base}/articles/{article}/files`
    pub fn files_url(&self, article: u64) -> String {
        format!(
            "{}/articles/{article}/files",
            self.options.api_base.trim_end_matches('/')
        )
    }

    /// List every file attached to an article.
    pub async fn list_files(&self, article: u64) -> Result<Vec<FigshareFile>> {
        let url = self.files_url(article);
        tracing::debug!(article, %url, "listing Figshare files");

        let resp = self.get(&url).await?;
        let text = resp.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| CloudError::Network(format!("failed to parse file listing: {e}")))
    }

    /// Stack files of a dataset, keyed by quantity.
    pub async fn index(&self, name: DatasetName) -> Result<FileIndex> {
        let article = article_id(name);
        let files = self.list_files(article).await?;
        let index = FileIndex::new(article, &files);
        tracing::info!(dataset = %name, article, stacks = index.len(), "resolved Figshare article");
        Ok(index)
    }

    /// Remote locations of a dataset's stacks.
    pub async fn resolve(&self, name: DatasetName) -> Result<QoiLocations> {
        Ok(self.index(name).await?.to_locations())
    }

    /// Download a whole file.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(%url, "downloading");
        let resp = self.get(url).await?;
        let bytes = resp.bytes().await?;
        tracing::debug!(%url, bytes = bytes.len(), "download complete");
        Ok(bytes.to_vec())
    }

    /// Download and decode a stack.
    pub async fn fetch_stack(&self, url: &str) -> Result<RasterStack> {
        let bytes = self.download(url).await?;
        Ok(flowuq_core::io::read_stack_from_buffer(&bytes)?)
    }

    /// Single GET; any transport failure or non-success status is final.
    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CloudError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }
}
