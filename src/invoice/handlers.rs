use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse, Responder};
use log::{error, info, warn};
use serde::Serialize;
use utoipa::ToSchema;

use crate::generators::{EngineState, InvoiceError};
use crate::invoice::models::InvoiceRecord;
use crate::{AppState, ErrorResponse};

/// Upper bound for invoice payloads (large `conceptos` lists).
const JSON_LIMIT: usize = 2 * 1024 * 1024;
const RETRY_AFTER_SECS: &str = "5";

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub engine: String,
    pub ready: bool,
}

/// Map a pipeline error to its HTTP response.
pub fn error_response(err: &InvoiceError) -> HttpResponse {
    let message = err.to_string();
    match err {
        InvoiceError::InvalidInvoice(_) => {
            HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message))
        }
        InvoiceError::EngineUnavailable(_) => HttpResponse::ServiceUnavailable()
            .insert_header((header::RETRY_AFTER, RETRY_AFTER_SECS))
            .json(ErrorResponse::service_unavailable(&message)),
        _ => HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&message)),
    }
}

/// Generate the PDF for a CFDI invoice.
///
/// The JSON body carries `total`, `emisor.rfc`, `receptor.rfc` and
/// `complemento.uuid`; any other fields are passed to the template as-is.
#[utoipa::path(
    post,
    path = "/api/invoices",
    tag = "Invoice Service",
    responses(
        (status = 200, description = "Generated invoice PDF (application/pdf attachment)"),
        (status = 400, description = "Invalid invoice payload", body = ErrorResponse),
        (status = 503, description = "Rendering engine not ready", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn generate_invoice(
    state: web::Data<AppState>,
    body: web::Json<InvoiceRecord>,
) -> impl Responder {
    let invoice = body.into_inner();
    let uuid = invoice.complemento.uuid.clone();
    info!("Executing generate_invoice handler for uuid: {}", uuid);

    match state.pipeline.generate(invoice).await {
        Ok(document) => {
            info!(
                "Invoice {} generated ({} bytes)",
                uuid,
                document.pdf.len()
            );
            HttpResponse::Ok()
                .content_type("application/pdf")
                .insert_header(ContentDisposition {
                    disposition: DispositionType::Attachment,
                    parameters: vec![DispositionParam::Filename(document.filename.clone())],
                })
                .streaming(document.into_stream())
        }
        Err(e) if e.is_transient() => {
            warn!("Invoice {} deferred: {}", uuid, e);
            error_response(&e)
        }
        Err(e) => {
            error!("Failed to generate invoice {}: {}", uuid, e);
            error_response(&e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Invoice Service",
    responses(
        (status = 200, description = "Rendering engine ready", body = HealthResponse),
        (status = 503, description = "Rendering engine not ready", body = HealthResponse)
    )
)]
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    let engine = state.engine.state();
    let body = HealthResponse {
        engine: engine.to_string(),
        ready: engine == EngineState::Ready,
    };

    if body.ready {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| {
            let message = err.to_string();
            warn!("Rejected invoice payload: {}", message);
            actix_web::error::InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message)),
            )
            .into()
        })
}

/// Configure invoice routes.
///
/// `GET /` with a JSON body is kept for existing clients.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(
            web::resource("/")
                .route(web::get().to(generate_invoice))
                .route(web::post().to(generate_invoice)),
        )
        .service(web::resource("/api/invoices").route(web::post().to(generate_invoice)))
        .service(web::resource("/api/health").route(web::get().to(health)));
}
