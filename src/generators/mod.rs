//! Generators module - business logic for turning an invoice record into a PDF.
//!
//! The pieces, leaf-first:
//! - `words` - spelled-out amount ("total en letras")
//! - `qr` - SAT verification URL and its QR image
//! - `template` - Handlebars merge of invoice data and derived fields
//! - `engine` - lifecycle of the shared headless browser
//! - `pipeline` - end-to-end orchestration for one invoice

pub mod assets;
pub mod chromium;
pub mod common;
pub mod engine;
pub mod pipeline;
pub mod qr;
pub mod template;
pub mod traits;
pub mod words;

pub use assets::{FsAssetProvider, LogoCache};
pub use chromium::ChromiumLauncher;
pub use engine::{EngineSettings, EngineState, PageLayout, RenderingEngine};
pub use pipeline::{GeneratedDocument, InvoicePipeline};
pub use template::{DerivedFields, TemplateRenderer};
pub use traits::{AssetProvider, BackendLauncher, RenderBackend};

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the rendering engine and its backend.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch rendering engine: {0}")]
    LaunchFailure(String),
    #[error("rendering engine is not ready (state: {0})")]
    Unavailable(EngineState),
    #[error("rendering failed: {0}")]
    RenderFailure(String),
    #[error("rendering timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that abort the generation of a single invoice.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invalid invoice payload: {0}")]
    InvalidInvoice(String),
    #[error("rendering engine failed to launch: {0}")]
    EngineLaunchFailure(String),
    #[error("rendering engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("failed to load asset '{name}': {source}")]
    AssetLoadFailure {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("template error: {0}")]
    TemplateError(String),
    #[error("failed to encode QR code: {0}")]
    QrEncoding(String),
    #[error("PDF rendering failed: {0}")]
    RenderFailure(String),
    #[error("failed to persist invoice artifact: {0}")]
    PersistenceFailure(String),
}

impl InvoiceError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::EngineUnavailable(_))
    }
}

impl From<EngineError> for InvoiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::LaunchFailure(reason) => Self::EngineLaunchFailure(reason),
            EngineError::Unavailable(state) => Self::EngineUnavailable(state.to_string()),
            EngineError::RenderFailure(reason) => Self::RenderFailure(reason),
            EngineError::Timeout(limit) => {
                Self::RenderFailure(format!("timed out after {:?}", limit))
            }
        }
    }
}
