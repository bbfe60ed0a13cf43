use axum::{routing::get, Router};
use orbitwatch_core::{logging, ConfigManager, EngineConfig};
use orbitwatch_engine::{Engine, JsonFileCatalog, Scheduler};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

mod config;
mod handlers;
mod state;

use config::Config;
use state::AppState;

pub(crate) fn app(state: Arc<AppState>) -> Router {
    let timeout = state.config.request_timeout;
    Router::new()
        .route("/health", get(handlers::health))
        .route("/snapshot", get(handlers::snapshot))
        .route("/snapshot/history", get(handlers::history))
        .route("/conjunctions", get(handlers::conjunctions))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout)),
        )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    if config.json_logs {
        logging::init_json();
    } else {
        logging::init();
    }

    let manager = match &config.engine_config_path {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new(EngineConfig::default())?,
    };
    let catalog = Arc::new(JsonFileCatalog::new(&config.catalog_path));
    let engine = tokio::task::spawn_blocking(move || Engine::new(Arc::new(manager), catalog))
        .await??;
    let engine = Arc::new(engine);

    let (scheduler, shutdown) = Scheduler::new(engine.clone());
    let scheduler_task = scheduler.spawn();

    let state = Arc::new(AppState::new(config.clone(), engine));
    let listener = TcpListener::bind(config.listen_addr()).await?;
    info!(service = "orbitwatch-api", addr = %config.listen_addr(), "Listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.shutdown();
    scheduler_task.await?;
    info!("OrbitWatch API stopped");
    Ok(())
}
