//! Bridge Config

use std::time::Duration;

use clap::Args;

use switchboard_app::sessions::BridgeConfig;

/// Device-session sidecar settings.
#[derive(Debug, Args)]
pub struct BridgeSettings {
    /// Sidecar base URL
    #[arg(long, env = "BRIDGE_URL", default_value = "http://localhost:8900")]
    pub bridge_url: String,

    /// Delay between sidecar polls, in milliseconds
    #[arg(long, env = "BRIDGE_POLL_INTERVAL_MS", default_value_t = 1_000_u64)]
    pub bridge_poll_interval_ms: u64,
}

impl BridgeSettings {
    /// Client configuration for the sidecar.
    #[must_use]
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            base_url: self.bridge_url.clone(),
            poll_interval: Duration::from_millis(self.bridge_poll_interval_ms),
        }
    }
}
