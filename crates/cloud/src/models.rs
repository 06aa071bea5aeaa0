//! Figshare API response types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use flowuq_core::{Qoi, QoiLocations, RasterLocation};

use crate::error::{CloudError, Result};

/// Suffix of stack file names; the remainder names the quantity.
pub const STACK_SUFFIX: &str = "_stack.tif";

/// One entry of `GET /articles/{id}/files`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigshareFile {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub download_url: String,
    #[serde(default)]
    pub computed_md5: Option<String>,
}

impl FigshareFile {
    /// Quantity named by the file, e.g. `hmax_stack.tif` → `hmax`.
    pub fn qoi(&self) -> Option<Qoi> {
        self.name.strip_suffix(STACK_SUFFIX)?.parse().ok()
    }
}

/// Download URLs of an article's stacks, keyed by quantity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileIndex {
    article: u64,
    urls: BTreeMap<Qoi, String>,
}

impl FileIndex {
    /// Index `files`, skipping any that are not `<qoi>_stack.tif`.
    pub fn new(article: u64, files: &[FigshareFile]) -> Self {
        let mut urls = BTreeMap::new();
        for file in files {
            match file.qoi() {
                Some(qoi) => {
                    urls.insert(qoi, file.download_url.clone());
                }
                None => tracing::debug!(article, name = %file.name, "skipping non-stack file"),
            }
        }
        Self { article, urls }
    }

    pub fn article(&self) -> u64 {
        self.article
    }

    /// Download URL of `qoi`
    pub fn url(&self, qoi: Qoi) -> Result<&str> {
        self.urls
            .get(&qoi)
            .map(String::as_str)
            .ok_or_else(|| CloudError::MissingFile {
                article: self.article,
                qoi: qoi.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Remote locations for a [`flowuq_core::StackSource`]
    pub fn to_locations(&self) -> QoiLocations {
        let mut locations = QoiLocations::new();
        for (qoi, url) in &self.urls {
            locations.insert(*qoi, RasterLocation::Remote(url.clone()));
        }
        locations
    }
}
