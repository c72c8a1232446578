//! Handlebars rendering of the invoice template.
//!
//! The template sees every field of the incoming invoice plus the derived
//! fields `logo`, `qrcontent` and `letras`. `total` is replaced by its
//! two-decimal text. Undefined references render as empty strings.

use handlebars::Handlebars;
use parking_lot::RwLock;
use serde_json::Value;
use std::io;
use std::sync::Arc;

use super::traits::AssetProvider;
use super::InvoiceError;
use crate::invoice::models::InvoiceRecord;

const TEMPLATE_NAME: &str = "factura";

/// Values computed for a single render.
#[derive(Debug, Clone)]
pub struct DerivedFields {
    /// Total with exactly two fractional digits.
    pub total: String,
    /// Spelled-out amount.
    pub letras: String,
    /// QR verification image as a `data:` URL.
    pub qrcontent: String,
    /// Logo as a `data:` URL.
    pub logo: Arc<String>,
}

/// Compile template source into a registry.
pub fn compile(source: &str) -> Result<Handlebars<'static>, InvoiceError> {
    let mut registry = Handlebars::new();
    registry
        .register_template_string(TEMPLATE_NAME, source)
        .map_err(|e| InvoiceError::TemplateError(e.to_string()))?;
    Ok(registry)
}

/// Merge the invoice with its derived fields into the template context.
pub fn context(invoice: &InvoiceRecord, derived: &DerivedFields) -> Result<Value, InvoiceError> {
    let mut value = serde_json::to_value(invoice)
        .map_err(|e| InvoiceError::TemplateError(format!("invoice is not serializable: {}", e)))?;

    let fields = value
        .as_object_mut()
        .ok_or_else(|| InvoiceError::TemplateError("invoice is not an object".to_string()))?;
    fields.insert("total".to_string(), Value::String(derived.total.clone()));
    fields.insert("logo".to_string(), Value::String(derived.logo.to_string()));
    fields.insert(
        "qrcontent".to_string(),
        Value::String(derived.qrcontent.clone()),
    );
    fields.insert("letras".to_string(), Value::String(derived.letras.clone()));

    Ok(value)
}

/// Render against an already compiled registry.
pub fn render_with(
    registry: &Handlebars<'static>,
    invoice: &InvoiceRecord,
    derived: &DerivedFields,
) -> Result<String, InvoiceError> {
    let data = context(invoice, derived)?;
    registry
        .render(TEMPLATE_NAME, &data)
        .map_err(|e| InvoiceError::TemplateError(e.to_string()))
}

/// Loads the template through an [`AssetProvider`] and renders invoices.
pub struct TemplateRenderer {
    assets: Arc<dyn AssetProvider>,
    file: String,
    cache_compiled: bool,
    compiled: RwLock<Option<Arc<Handlebars<'static>>>>,
}

impl TemplateRenderer {
    pub fn new(assets: Arc<dyn AssetProvider>, file: impl Into<String>, cache_compiled: bool) -> Self {
        Self {
            assets,
            file: file.into(),
            cache_compiled,
            compiled: RwLock::new(None),
        }
    }

    async fn registry(&self) -> Result<Arc<Handlebars<'static>>, InvoiceError> {
        if self.cache_compiled {
            if let Some(registry) = self.compiled.read().clone() {
                return Ok(registry);
            }
        }

        let bytes = self
            .assets
            .load(&self.file)
            .await
            .map_err(|source| InvoiceError::AssetLoadFailure {
                name: self.file.clone(),
                source,
            })?;
        let source = String::from_utf8(bytes).map_err(|e| InvoiceError::AssetLoadFailure {
            name: self.file.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        let registry = Arc::new(compile(&source)?);
        log::debug!("Compiled template '{}'", self.file);

        if self.cache_compiled {
            *self.compiled.write() = Some(registry.clone());
        }
        Ok(registry)
    }

    pub async fn render(
        &self,
        invoice: &InvoiceRecord,
        derived: &DerivedFields,
    ) -> Result<String, InvoiceError> {
        let registry = self.registry().await?;
        render_with(&registry, invoice, derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn invoice() -> InvoiceRecord {
        serde_json::from_value(serde_json::json!({
            "total": 1234.5,
            "emisor": { "rfc": "E1", "nombre": "Emisor SA" },
            "receptor": { "rfc": "R1" },
            "complemento": { "uuid": "U1" },
            "folio": "F-77"
        }))
        .unwrap()
    }

    fn derived() -> DerivedFields {
        DerivedFields {
            total: "1234.50".to_string(),
            letras: "MIL DOSCIENTOS TREINTA Y CUATRO 50/100".to_string(),
            qrcontent: "data:image/png;base64,QR".to_string(),
            logo: Arc::new("data:image/png;base64,LOGO".to_string()),
        }
    }

    struct StaticTemplate {
        source: &'static str,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl AssetProvider for StaticTemplate {
        async fn load(&self, _name: &str) -> io::Result<Vec<u8>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.source.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_context_merges_fields() {
        let data = context(&invoice(), &derived()).unwrap();
        assert_eq!(data["total"], "1234.50");
        assert_eq!(data["folio"], "F-77");
        assert_eq!(data["emisor"]["nombre"], "Emisor SA");
        assert_eq!(data["letras"], "MIL DOSCIENTOS TREINTA Y CUATRO 50/100");
        assert_eq!(data["logo"], "data:image/png;base64,LOGO");
    }

    #[test]
    fn test_render_substitutes_nested_and_derived_fields() {
        let registry =
            compile("{{emisor.nombre}}|{{complemento.uuid}}|{{total}}|{{letras}}").unwrap();
        let html = render_with(&registry, &invoice(), &derived()).unwrap();
        assert_eq!(
            html,
            "Emisor SA|U1|1234.50|MIL DOSCIENTOS TREINTA Y CUATRO 50/100"
        );
    }

    #[test]
    fn test_undefined_fields_render_empty() {
        let registry = compile("[{{receptor.nombre}}]").unwrap();
        let html = render_with(&registry, &invoice(), &derived()).unwrap();
        assert_eq!(html, "[]");
    }

    #[test]
    fn test_malformed_template_is_rejected() {
        assert!(matches!(
            compile("{{#each conceptos}}<tr>"),
            Err(InvoiceError::TemplateError(_))
        ));
    }

    #[tokio::test]
    async fn test_compiled_template_is_cached() {
        let assets = Arc::new(StaticTemplate {
            source: "{{complemento.uuid}}",
            loads: AtomicUsize::new(0),
        });
        let renderer = TemplateRenderer::new(assets.clone(), "factura.hbs", true);

        for _ in 0..3 {
            assert_eq!(renderer.render(&invoice(), &derived()).await.unwrap(), "U1");
        }
        assert_eq!(assets.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_uncached_template_reloads_per_render() {
        let assets = Arc::new(StaticTemplate {
            source: "{{complemento.uuid}}",
            loads: AtomicUsize::new(0),
        });
        let renderer = TemplateRenderer::new(assets.clone(), "factura.hbs", false);

        renderer.render(&invoice(), &derived()).await.unwrap();
        renderer.render(&invoice(), &derived()).await.unwrap();
        assert_eq!(assets.loads.load(Ordering::SeqCst), 2);
    }
}
