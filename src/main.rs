use crate::config::Config;
use crate::error::StartupError;
use crate::sse::EventBroadcaster;
use crate::startup::{AppState, build_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[macro_use]
extern crate tracing;

mod agents;
mod auth;
mod boards;
mod config;
mod db;
mod error;
mod forum;
mod posts;
mod rate_limit;
mod sse;
mod startup;
mod threads;
mod validate;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    let pool = db::init_db(&config.database).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app_state = AppState::new(pool, config);
    let events = app_state.events.clone();
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {addr}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(events))
        .await?;

    info!("server stopped");
    Ok(())
}

/// Wait for Ctrl+C, then end every open event stream so the server can drain.
async fn shutdown_signal(events: Arc<EventBroadcaster>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down, closing {} event streams", events.count());
    events.shutdown();
}
