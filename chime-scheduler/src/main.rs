use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod peer;
pub mod repository;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

use crate::config::Config;
use crate::peer::PeerClient;
use crate::scheduler::{Scheduler, seeder};
use crate::service::execution::HttpExecutionService;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chime_scheduler=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Chime Scheduler...");

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let templates = match &config.job_templates_path {
        Some(path) => seeder::load_templates(path).expect("Failed to load job templates"),
        None => Vec::new(),
    };

    let peers = PeerClient::new(
        config.peers.clone(),
        config.http_timeout,
        config.bot_api_key.as_deref(),
    )
    .expect("Failed to build peer HTTP client");
    tracing::info!("Configured {} peer bot(s)", config.peers.len());

    let executor = HttpExecutionService::new(pool.clone(), peers)
        .with_body_limit(config.response_body_limit);

    let scheduler = Arc::new(Scheduler::new(
        pool.clone(),
        Arc::new(executor),
        config.scheduler_config(),
        templates,
    ));

    scheduler
        .start()
        .await
        .expect("Failed to start scheduler");

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        pool,
        scheduler: Arc::clone(&scheduler),
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    scheduler.stop().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
