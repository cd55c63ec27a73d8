//! Admin Config

use clap::Args;

/// Administrative API settings.
#[derive(Debug, Args)]
pub struct AdminConfig {
    /// Bearer token required by the `/admin` routes
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: String,
}
