use actix_web::{web, HttpResponse};
use prometheus::{Encoder, TextEncoder};
use std::io;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{env::Settings, simulation::ConfigStore};

pub mod env;
pub mod errors;
pub mod limits;
pub mod metrics;
pub mod simulation;

pub struct LoggerManager {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

impl LoggerManager {
    pub fn setup(settings: &Settings) -> Self {
        // 1. daily rolling file under logging.directory
        let file_appender = RollingFileAppender::new(
            Rotation::DAILY,
            &settings.logging.directory,
            &settings.logging.filename,
        );
        let (non_blocking_file_writer, guard) = tracing_appender::non_blocking(file_appender);

        // 2. level filter: RUST_LOG wins over server.log_level
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&settings.server.log_level));

        // 3. console layer, human readable
        let console_layer = fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .with_thread_names(true)
            .with_target(false)
            .pretty();

        // 4. file layer, no ANSI codes, with source locations
        let file_layer = fmt::layer()
            .with_writer(non_blocking_file_writer)
            .with_ansi(false)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(false);

        // 5. install filter and both layers as the global subscriber
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        tracing::info!(
            "logger initialized: console and file ({}/{})",
            settings.logging.directory,
            settings.logging.filename
        );

        Self { _guard: guard }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: ConfigStore,
    pub metrics_registry: prometheus::Registry,
}

impl AppState {
    /// Registry with the simulation collectors registered.
    pub fn new(store: ConfigStore) -> Result<Self, prometheus::Error> {
        let metrics_registry = prometheus::Registry::new();
        ::metrics::register_custom_metrics(&metrics_registry)?;
        Ok(Self {
            store,
            metrics_registry,
        })
    }
}

pub async fn metrics_route(state: web::Data<AppState>) -> HttpResponse {
    let metric_families = state.metrics_registry.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(format!("Metrics encode error: {}", e));
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

/// Every route the service exposes. Expects `web::Data<AppState>` on the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(limits::configure)
        .route("/metrics", web::get().to(metrics_route))
        .route("/health", web::get().to(|| async { HttpResponse::Ok().body("OK") }))
        .route("/ready", web::get().to(|| async { HttpResponse::Ok().body("READY") }));
}
