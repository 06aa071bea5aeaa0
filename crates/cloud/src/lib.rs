//! # FlowUQ Cloud
//!
//! Remote access to the published simulation datasets.
//!
//! - [`FigshareClient`]: async listing and download of Figshare articles
//! - [`FigshareClientBlocking`]: the same behind an internal Tokio runtime
//! - [`CatalogSource`]: a [`flowuq_core::StackSource`] over local paths and URLs

pub mod blocking;
pub mod error;
pub mod figshare;
pub mod models;
pub mod source;

pub use blocking::FigshareClientBlocking;
pub use error::{CloudError, Result};
pub use figshare::{FIGSHARE_API, FigshareClient, FigshareOptions, article_id};
pub use models::{FigshareFile, FileIndex, STACK_SUFFIX};
pub use source::CatalogSource;
