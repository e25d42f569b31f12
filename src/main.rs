//! Arena Shooter Server - Authoritative multiplayer game server
//!
//! This is the main entry point for the game server. It handles:
//! - WebSocket connections for real-time gameplay
//! - Fixed-tick simulation across independent game worlds
//! - Tiled map loading for wall collision
//! - State broadcasts to connected clients

mod app;
mod config;
mod game;
mod http;
mod util;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::AppState;
use crate::config::Config;
use crate::game::{spawn_input_consumer, GameLoop, TickScheduler};
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level);
    init_server_time();

    info!("Starting Arena Shooter Server");
    info!("Server address: {}", config.server_addr);
    info!(
        "Tick interval: {}ms, snapshot interval: {}ms",
        config.tick_interval_ms, config.snapshot_interval_ms
    );

    let tick_period = Duration::from_millis(config.tick_interval_ms);
    let snapshot_interval = Duration::from_millis(config.snapshot_interval_ms);

    let (state, intent_rx) = AppState::new(config.clone());

    // Spawn the input consumer task
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = spawn_input_consumer(intent_rx, state.worlds.clone(), shutdown_rx);

    // Spawn the tick driver
    let game_loop = Arc::new(GameLoop::new(
        state.worlds.clone(),
        tick_period,
        snapshot_interval,
    ));
    let loop_handle = game_loop.clone();
    let scheduler = TickScheduler::spawn(tick_period, move || loop_handle.tick());

    let router = build_router(state);

    // Bind and serve until a shutdown signal arrives
    let addr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Listening on {}", addr);
    info!("Health check at http://{}/health", addr);
    info!("Game socket at ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the simulation before dropping the state
    scheduler.shutdown().await;
    shutdown_tx.send(true).ok();
    consumer.await.ok();

    info!("Server shutdown complete");
    Ok(())
}

/// Tracing setup. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves when Ctrl+C or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, shutting down");
        }
        _ = terminate => {
            info!("SIGTERM received, shutting down");
        }
    }
}
