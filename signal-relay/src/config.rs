//! Configuration loading for signal-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`).

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for signal-relay.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Rate limiting configuration.
    pub limits: LimitsConfig,
    /// HTTP endpoints configuration.
    pub http: HttpConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the WebSocket listener (default: 0.0.0.0:4470).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum registrations per identity per minute (default: 10).
    ///
    /// Covers reconnect storms; a flapping client is throttled without
    /// affecting anyone else.
    #[serde(default = "default_registrations_per_minute")]
    pub registrations_per_minute: u32,
    /// Maximum signaling/forward frames per identity per minute (default: 300).
    #[serde(default = "default_messages_per_minute")]
    pub messages_per_minute: u32,
    /// Aggregate frames per second across all clients (default: 2000).
    #[serde(default = "default_global_messages_per_second")]
    pub global_messages_per_second: u32,
    /// Timeout in seconds for receiving Register after connection (default: 10).
    /// Connections that don't register within this time are dropped.
    #[serde(default = "default_register_timeout_secs")]
    pub register_timeout_secs: u64,
    /// Maximum accepted frame size in bytes (default: 64 KiB).
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Bind address for the HTTP server (default: 0.0.0.0:8080).
    #[serde(default = "default_http_bind")]
    pub bind_address: String,
    /// Enable the metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:4470".to_string()
}

fn default_registrations_per_minute() -> u32 {
    10
}

fn default_messages_per_minute() -> u32 {
    300
}

fn default_global_messages_per_second() -> u32 {
    2000
}

fn default_register_timeout_secs() -> u64 {
    10
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_http_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: default_bind_address(),
            },
            limits: LimitsConfig {
                registrations_per_minute: default_registrations_per_minute(),
                messages_per_minute: default_messages_per_minute(),
                global_messages_per_second: default_global_messages_per_second(),
                register_timeout_secs: default_register_timeout_secs(),
                max_frame_bytes: default_max_frame_bytes(),
            },
            http: HttpConfig {
                bind_address: default_http_bind(),
                metrics_enabled: default_metrics_enabled(),
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
