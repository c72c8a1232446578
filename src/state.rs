//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::generators::{
    AssetProvider, FsAssetProvider, InvoicePipeline, LogoCache, RenderingEngine, TemplateRenderer,
};
use crate::storage::{ArtifactStore, LocalArtifactStore};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<InvoicePipeline>,
    pub engine: Arc<RenderingEngine>,
}

impl AppState {
    /// Wire the pipeline from configuration around an existing engine.
    pub fn new(config: &ServerConfig, engine: Arc<RenderingEngine>) -> Self {
        let assets: Arc<dyn AssetProvider> = Arc::new(FsAssetProvider::new(&config.assets_dir));
        let store: Option<Arc<dyn ArtifactStore>> = if config.persist_invoices {
            Some(Arc::new(LocalArtifactStore::new(&config.invoices_dir)))
        } else {
            None
        };

        let pipeline = InvoicePipeline::new(
            engine.clone(),
            TemplateRenderer::new(
                assets.clone(),
                config.template_file.clone(),
                config.cache_template,
            ),
            LogoCache::new(assets, config.logo_file.clone()),
            store,
        );

        Self::from_parts(Arc::new(pipeline))
    }

    pub fn from_parts(pipeline: Arc<InvoicePipeline>) -> Self {
        let engine = pipeline.engine().clone();
        Self { pipeline, engine }
    }
}
