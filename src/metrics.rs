//! Pipeline metrics, registered on the default Prometheus registry.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder,
};

lazy_static! {
    pub static ref INVOICES_GENERATED: IntCounter = register_int_counter!(
        "invoices_generated_total",
        "Invoices rendered to PDF successfully"
    )
    .expect("invoices_generated_total can be registered");
    pub static ref INVOICE_FAILURES: IntCounter = register_int_counter!(
        "invoice_failures_total",
        "Invoice requests that failed before a PDF was produced"
    )
    .expect("invoice_failures_total can be registered");
    pub static ref PERSISTENCE_FAILURES: IntCounter = register_int_counter!(
        "invoice_persistence_failures_total",
        "Generated PDFs that could not be stored"
    )
    .expect("invoice_persistence_failures_total can be registered");
    pub static ref PDF_RENDER_SECONDS: Histogram = register_histogram!(
        "pdf_render_seconds",
        "Time spent rendering markup to PDF",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("pdf_render_seconds can be registered");
}

/// GET /api/metrics
pub async fn metrics_handler() -> HttpResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        log::error!("Failed to encode metrics: {}", e);
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
