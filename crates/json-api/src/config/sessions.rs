//! Session Config

use std::time::Duration;

use clap::Args;

use switchboard_app::sessions::SessionConfig;

/// Session lifecycle bounds.
#[derive(Debug, Args)]
pub struct SessionSettings {
    /// Default bound on opening a session, in seconds
    #[arg(long, env = "CONNECT_TIMEOUT_SECONDS", default_value_t = 30_u64)]
    pub connect_timeout_seconds: u64,

    /// Default time a pairing flow may stay unfinished before it is abandoned, in seconds
    #[arg(long, env = "PAIR_TIMEOUT_SECONDS", default_value_t = 30_u64)]
    pub pair_timeout_seconds: u64,

    /// How long a QR poll waits for a payload, in milliseconds
    #[arg(long, env = "QR_WAIT_TIMEOUT_MS", default_value_t = 5_000_u64)]
    pub qr_wait_timeout_ms: u64,

    /// Reconnect previously connected instances at startup
    #[arg(long, env = "RESTORE_ON_BOOT", default_value_t = false)]
    pub restore_on_boot: bool,
}

impl SessionSettings {
    /// Orchestrator bounds.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            pair_timeout: Duration::from_secs(self.pair_timeout_seconds),
            qr_wait_timeout: Duration::from_millis(self.qr_wait_timeout_ms),
        }
    }
}
