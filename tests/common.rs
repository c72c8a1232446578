#![allow(dead_code)]

use async_trait::async_trait;
use cfdi_invoice_server::config::LaunchOptions;
use cfdi_invoice_server::generators::engine::PageLayout;
use cfdi_invoice_server::generators::{
    AssetProvider, BackendLauncher, EngineError, EngineSettings, InvoicePipeline, LogoCache,
    RenderBackend, RenderingEngine, TemplateRenderer,
};
use cfdi_invoice_server::invoice::InvoiceRecord;
use cfdi_invoice_server::storage::ArtifactStore;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_TEMPLATE: &str = r#"<html><body>
<img id="logo" src="{{logo}}">
<img id="qr" src="{{qrcontent}}">
<p id="uuid">{{complemento.uuid}}</p>
<p id="emisor">{{emisor.nombre}} {{emisor.rfc}}</p>
<p id="total">{{total}}</p>
<p id="letras">{{letras}}</p>
</body></html>"#;

/// PNG bytes used as the test logo.
pub const LOGO_PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Backend that "prints" by wrapping the markup in a PDF header and trailer.
pub struct FakeBackend {
    pub delay: Duration,
}

#[async_trait]
impl RenderBackend for FakeBackend {
    async fn print_pdf(&self, markup: &str, _layout: &PageLayout) -> Result<Vec<u8>, EngineError> {
        tokio::time::sleep(self.delay).await;
        Ok(format!("%PDF-1.7\n{}\n%%EOF", markup).into_bytes())
    }

    async fn shutdown(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

pub struct FakeLauncher {
    pub delay: Duration,
}

#[async_trait]
impl BackendLauncher for FakeLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Arc<dyn RenderBackend>, EngineError> {
        Ok(Arc::new(FakeBackend { delay: self.delay }))
    }
}

/// In-memory asset provider.
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new(template: &str) -> Self {
        let mut files = HashMap::new();
        files.insert("factura.hbs".to_string(), template.as_bytes().to_vec());
        files.insert("mdslogo.png".to_string(), LOGO_PNG.to_vec());
        Self { files }
    }

    pub fn without(mut self, name: &str) -> Self {
        self.files.remove(name);
        self
    }
}

#[async_trait]
impl AssetProvider for MemoryAssets {
    async fn load(&self, name: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))
    }
}

/// In-memory artifact store; can be told to fail every write.
pub struct MemoryStore {
    files: tokio::sync::Mutex<HashMap<String, Vec<u8>>>,
    fail: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            files: tokio::sync::Mutex::new(HashMap::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn save(&self, key: &str, data: &[u8]) -> Result<(), String> {
        if self.fail {
            return Err("disk full".to_string());
        }
        self.files.lock().await.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        max_concurrent_renders: 3,
        render_timeout: Duration::from_secs(5),
        ready_timeout: Duration::from_millis(200),
    }
}

/// Engine that has completed its launch with the fake backend.
pub async fn ready_engine() -> Arc<RenderingEngine> {
    let engine = Arc::new(RenderingEngine::new(test_settings()));
    engine
        .launch(
            &FakeLauncher {
                delay: Duration::from_millis(5),
            },
            &LaunchOptions::Default,
        )
        .await
        .expect("fake engine launches");
    engine
}

pub fn pipeline_with(
    engine: Arc<RenderingEngine>,
    assets: MemoryAssets,
    store: Option<Arc<dyn ArtifactStore>>,
) -> Arc<InvoicePipeline> {
    let assets: Arc<dyn AssetProvider> = Arc::new(assets);
    Arc::new(InvoicePipeline::new(
        engine,
        TemplateRenderer::new(assets.clone(), "factura.hbs", true),
        LogoCache::new(assets, "mdslogo.png"),
        store,
    ))
}

pub fn invoice_json(total: serde_json::Value, uuid: &str, emisor: &str, receptor: &str) -> serde_json::Value {
    serde_json::json!({
        "total": total,
        "emisor": { "rfc": emisor, "nombre": "Mercado de Software SA de CV" },
        "receptor": { "rfc": receptor, "nombre": "Cliente General" },
        "complemento": { "uuid": uuid },
        "serie": "A",
        "folio": "1001"
    })
}

pub fn invoice(total: f64, uuid: &str, emisor: &str, receptor: &str) -> InvoiceRecord {
    serde_json::from_value(invoice_json(serde_json::json!(total), uuid, emisor, receptor))
        .expect("valid invoice")
}

/// Text between `<p id="{id}">` and the closing tag in rendered markup.
pub fn element_text(pdf: &[u8], id: &str) -> String {
    let text = String::from_utf8_lossy(pdf);
    let open = format!("<p id=\"{}\">", id);
    let start = text.find(&open).expect("element present") + open.len();
    let end = text[start..].find("</p>").expect("element closed") + start;
    text[start..end].to_string()
}
