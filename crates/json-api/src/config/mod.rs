//! Server configuration module

use std::net::SocketAddr;

use clap::Parser;

use crate::config::{
    admin::AdminConfig,
    bridge::BridgeSettings,
    db::DatabaseConfig,
    observability::{LoggingConfig, ObservabilityConfig},
    server::ServerRuntimeConfig,
    sessions::SessionSettings,
};

pub(crate) mod admin;
pub(crate) mod bridge;
pub(crate) mod db;
pub(crate) mod observability;
pub(crate) mod server;
pub(crate) mod sessions;

/// Switchboard JSON API Server configuration
#[derive(Debug, Parser)]
#[command(name = "switchboard-json", about = "Switchboard JSON API Server", long_about = None)]
pub struct ServerConfig {
    /// Server network settings.
    #[command(flatten)]
    pub server: ServerRuntimeConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Observability (traces/metrics) settings.
    #[command(flatten)]
    pub observability: ObservabilityConfig,

    /// Application database settings.
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Administrative API settings.
    #[command(flatten)]
    pub admin: AdminConfig,

    /// Device-session sidecar settings.
    #[command(flatten)]
    pub bridge: BridgeSettings,

    /// Session lifecycle bounds.
    #[command(flatten)]
    pub sessions: SessionSettings,
}

impl ServerConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Get the socket address for binding
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        self.server.socket_addr()
    }
}
