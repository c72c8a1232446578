use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod generators;
pub mod invoice;
pub mod metrics;
pub mod state;
pub mod storage;


pub use crate::state::AppState;

use crate::config::ServerConfig;
use crate::generators::{ChromiumLauncher, RenderingEngine};

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn service_unavailable(message: &str) -> Self {
        Self::new("ServiceUnavailable", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::invoice::handlers::generate_invoice,
        crate::invoice::handlers::health
    ),
    components(schemas(
        ErrorResponse,
        invoice::handlers::HealthResponse,
        invoice::models::InvoiceRecord,
        invoice::models::Party,
        invoice::models::Complemento
    )),
    tags((name = "Invoice Service", description = "CFDI invoice PDF generation."))
)]
pub struct ApiDoc;

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env()?;
    log::info!("Loaded configuration: {:?}", config);

    let engine = Arc::new(RenderingEngine::new(config.engine_settings()));
    // Requests arriving before the browser is up wait on the engine's launch barrier.
    let _launch = engine.start(Arc::new(ChromiumLauncher::new()), config.launch.clone())?;

    let app_state = web::Data::new(AppState::new(&config, engine.clone()));

    let prometheus = PrometheusMetricsBuilder::new("cfdi_invoice_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create Prometheus metrics middleware: {:?}", e))?;

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .expose_headers(vec![header::CONTENT_DISPOSITION])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(invoice::config)
            .service(web::resource("/api/metrics").route(web::get().to(metrics::metrics_handler)))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    log::info!("Server stopped, shutting down rendering engine");
    engine.shutdown().await;
    Ok(())
}
