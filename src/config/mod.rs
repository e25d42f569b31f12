//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origin for CORS ("*" for any)
    pub client_origin: String,

    /// Map id used for new worlds and as fallback for unknown requests
    pub default_map: String,
    /// Directory holding Tiled map exports (.tmj)
    pub maps_dir: PathBuf,

    /// Simulation tick interval in milliseconds
    pub tick_interval_ms: u64,
    /// Minimum interval between state snapshots in milliseconds
    pub snapshot_interval_ms: u64,
    /// Seat limit per game world
    pub max_players_per_world: usize,
    /// Capacity of the bounded intent queue feeding the simulation
    pub input_queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            default_map: env::var("DEFAULT_MAP").unwrap_or_else(|_| "map2".to_string()),

            maps_dir: env::var("MAPS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("assets/maps")),

            tick_interval_ms: parse_env("TICK_INTERVAL_MS", 20)?,
            snapshot_interval_ms: parse_env("SNAPSHOT_INTERVAL_MS", 50)?,
            max_players_per_world: parse_env("MAX_PLAYERS_PER_WORLD", 6)?,
            input_queue_capacity: parse_env("INPUT_QUEUE_CAPACITY", 256)?,
        })
    }
}

/// Parse an optional numeric environment variable, failing loudly on
/// malformed values instead of silently falling back.
fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid numeric value for environment variable: {0}")]
    InvalidNumber(&'static str),
}
