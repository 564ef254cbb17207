//! Lunar Server
//!
//! Accepts Lua code fragments over HTTP, runs them on a bounded worker pool
//! and exposes their status, result and captured output.

use anyhow::{Context, Result};
use lunar_lua::LuaEngine;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lunar_server::api;
use lunar_server::config::Config;
use lunar_server::execution::WorkerPool;
use lunar_server::repository::JobRegistry;
use lunar_server::service::JobService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lunar_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Lunar Server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: bind_addr={}, worker_threads={}, memory_limit={:?}",
        config.bind_addr, config.worker_threads, config.memory_limit
    );

    // Initialize services
    let engine = Arc::new(LuaEngine::new(config.engine_config()));
    let pool = WorkerPool::new(Handle::current(), config.worker_threads);
    info!("Worker pool ready with {} workers", pool.size());
    let registry = Arc::new(JobRegistry::new());
    let service = Arc::new(JobService::new(registry, pool, engine));

    // Build router with all API endpoints
    let app = api::create_router(service);

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
