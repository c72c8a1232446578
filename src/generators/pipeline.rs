//! End-to-end invoice generation.

use actix_web::web::Bytes;
use futures::stream::{self, Stream};
use std::sync::Arc;

use super::assets::LogoCache;
use super::common::normalize_total;
use super::engine::RenderingEngine;
use super::template::{DerivedFields, TemplateRenderer};
use super::words::amount_in_words;
use super::{qr, InvoiceError};
use crate::invoice::models::InvoiceRecord;
use crate::metrics;
use crate::storage::{artifact_key, ArtifactStore};

/// Filename suggested to the client for the download.
pub const DOWNLOAD_FILENAME: &str = "invoice.pdf";

/// Result of a successful invoice generation.
#[derive(Debug)]
pub struct GeneratedDocument {
    pub filename: String,
    /// Key of the artifact in the persistent store (`invoice_<uuid>.pdf`).
    pub artifact_key: String,
    pub pdf: Vec<u8>,
    pub letras: String,
}

impl GeneratedDocument {
    /// Single-pass byte stream over the PDF.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        stream::once(async move { Ok(Bytes::from(self.pdf)) })
    }
}

pub struct InvoicePipeline {
    engine: Arc<RenderingEngine>,
    templates: TemplateRenderer,
    logo: LogoCache,
    store: Option<Arc<dyn ArtifactStore>>,
}

impl InvoicePipeline {
    pub fn new(
        engine: Arc<RenderingEngine>,
        templates: TemplateRenderer,
        logo: LogoCache,
        store: Option<Arc<dyn ArtifactStore>>,
    ) -> Self {
        Self {
            engine,
            templates,
            logo,
            store,
        }
    }

    pub fn engine(&self) -> &Arc<RenderingEngine> {
        &self.engine
    }

    /// Generate the PDF for one invoice.
    ///
    /// Any failure before the PDF exists aborts the request. A failure to
    /// store the finished PDF is logged and the PDF is still returned.
    pub async fn generate(&self, invoice: InvoiceRecord) -> Result<GeneratedDocument, InvoiceError> {
        let result = self.build(invoice).await;
        match &result {
            Ok(_) => metrics::INVOICES_GENERATED.inc(),
            Err(_) => metrics::INVOICE_FAILURES.inc(),
        }
        result
    }

    async fn build(&self, mut invoice: InvoiceRecord) -> Result<GeneratedDocument, InvoiceError> {
        let uuid = invoice.complemento.uuid.clone();

        let (total, total_text) = normalize_total(invoice.total)?;
        invoice.total = total;

        let letras = amount_in_words(total);
        log::debug!("Invoice {}: total {} -> '{}'", uuid, total_text, letras);

        let qrcontent = qr::build(&uuid, &invoice.emisor.rfc, &invoice.receptor.rfc)?;
        let logo = self.logo.data_url().await?;

        let derived = DerivedFields {
            total: total_text,
            letras,
            qrcontent,
            logo,
        };
        let markup = self.templates.render(&invoice, &derived).await?;
        log::debug!("Invoice {}: rendered {} bytes of markup", uuid, markup.len());

        let timer = metrics::PDF_RENDER_SECONDS.start_timer();
        let rendered = self.engine.render_to_pdf(&markup).await;
        timer.observe_duration();
        let pdf = rendered?;

        let artifact_key = artifact_key(&uuid);
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&artifact_key, &pdf).await {
                let err = InvoiceError::PersistenceFailure(e);
                log::warn!("Invoice {}: {}", uuid, err);
                metrics::PERSISTENCE_FAILURES.inc();
            } else {
                log::debug!("Invoice {}: stored as {}", uuid, artifact_key);
            }
        }

        Ok(GeneratedDocument {
            filename: DOWNLOAD_FILENAME.to_string(),
            artifact_key,
            pdf,
            letras: derived.letras,
        })
    }
}
