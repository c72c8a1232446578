//! Traits at the seams of the invoice generator.

use async_trait::async_trait;
use std::sync::Arc;

use super::engine::PageLayout;
use super::EngineError;
use crate::config::LaunchOptions;

/// A launched rendering process able to print markup to PDF.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Print `markup` on a fresh, isolated surface and release it afterwards.
    async fn print_pdf(&self, markup: &str, layout: &PageLayout) -> Result<Vec<u8>, EngineError>;

    /// Stop the underlying process.
    async fn shutdown(&self) -> Result<(), EngineError>;
}

/// Starts a [`RenderBackend`] for the given launch options.
#[async_trait]
pub trait BackendLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn RenderBackend>, EngineError>;
}

/// Opaque byte provider for static assets (logo, template source).
#[async_trait]
pub trait AssetProvider: Send + Sync {
    async fn load(&self, name: &str) -> std::io::Result<Vec<u8>>;
}
