use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use load_generator::{
    env::{Cli, Settings},
    metrics::MetricsCtx,
    simulation::{driver, ConfigStore, Simulator},
    AppState, LoggerManager,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 1. .env
    dotenv::dotenv().ok();

    // 2. settings: defaults < config file < APP_* env < command line
    let cli = Cli::parse();
    let settings = Settings::new(&cli).context("failed to load settings")?;
    let initial = settings
        .simulation
        .initial_config()
        .context("refusing to start with invalid simulation parameters")?;

    // 3. logger
    let _logger_manager = LoggerManager::setup(&settings);
    info!("using max duration {}", initial.max_duration);
    info!("using error rate {}", initial.error_rate);
    info!("using request rate {}", initial.request_rate);

    // 4. store + metrics
    let store = ConfigStore::new(initial);
    let app_state = AppState::new(store.clone()).context("failed to register metrics")?;
    info!("metrics initialized and registered");

    // 5. simulation driver
    let shutdown_token = CancellationToken::new();
    let driver_handle = driver::spawn(
        Simulator::from_seed_or_clock(settings.simulation.seed),
        store,
        Arc::new(MetricsCtx::new()),
        shutdown_token.clone(),
    );

    // 6. HTTP server
    let bind_address = format!("{}:{}", settings.server.bind_address, settings.server.port);
    info!("Starting HTTP server on {}", bind_address);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(load_generator::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}", bind_address))?
    .disable_signals()
    .run();

    let server_handle = server.handle();

    // 7. wait for shutdown
    tokio::select! {
        res = &mut server => {
            error!("Server exited unexpectedly");
            shutdown_token.cancel();
            return res.context("HTTP server failed");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received. Initiating graceful shutdown...");
            shutdown_token.cancel();
            server_handle.stop(true).await;
        },
    }

    server.await?;
    if let Err(e) = driver_handle.await {
        error!("simulation driver task failed: {}", e);
    }
    info!("System has shut down gracefully");

    Ok(())
}
