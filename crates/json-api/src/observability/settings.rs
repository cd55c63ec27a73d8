//! Request tracing settings, fixed once at startup.

use std::{sync::OnceLock, time::Duration};

use tracing::warn;

use crate::config::observability::ObservabilityConfig;

static REQUEST_SETTINGS: OnceLock<RequestSettings> = OnceLock::new();

/// How the request middleware traces and flags requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct RequestSettings {
    pub(super) slow_threshold: Duration,

    /// Whether an inbound `traceparent` header parents the request span.
    pub(super) propagate_parent: bool,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            slow_threshold: Duration::from_secs(1),
            propagate_parent: false,
        }
    }
}

impl RequestSettings {
    pub(super) fn from_config(config: &ObservabilityConfig) -> Self {
        Self {
            slow_threshold: Duration::from_millis(config.slow_request_threshold_ms),
            // Without an exporter there is no propagator installed to read it.
            propagate_parent: config.otel_enabled && config.otel_parent_propagation_enabled,
        }
    }
}

pub(super) fn install(config: &ObservabilityConfig) {
    if REQUEST_SETTINGS.set(RequestSettings::from_config(config)).is_err() {
        warn!("request settings were already installed");
    }
}

pub(super) fn current() -> RequestSettings {
    REQUEST_SETTINGS.get().copied().unwrap_or_default()
}
