//! HTTP client for the device-session sidecar.
//!
//! The sidecar owns the actual network sessions. Pairing and liveness are
//! observed by polling it, and every poll outcome is translated into the
//! [`ClientEvent`] stream the orchestrator drains.

use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::{sync::mpsc, time};
use tracing::{debug, warn};

use crate::{
    domain::instances::records::{InstanceRecord, InstanceUuid},
    sessions::client::{
        ClientError, ClientEvent, Connection, ConnectionClient, DeviceIdentity, Session,
    },
};

/// Consecutive failed polls after which a session is reported lost.
const MAX_POLL_FAILURES: u32 = 3;

const EVENT_BUFFER: usize = 16;

/// Configuration for reaching the sidecar.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Sidecar base URL, e.g. `"http://localhost:8900"`.
    pub base_url: String,

    /// Delay between pairing and liveness polls.
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
struct BridgeApi {
    http: Client,
    base_url: String,
}

impl BridgeApi {
    fn device_url(&self, device: InstanceUuid, suffix: &str) -> String {
        format!(
            "{}/devices/{device}{suffix}",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn start_pairing(&self, device: InstanceUuid) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.device_url(device, "/pairing"))
            .send()
            .await?;

        expect_success("start pairing", response).await?;

        Ok(())
    }

    async fn pairing_state(&self, device: InstanceUuid) -> Result<PairingState, ClientError> {
        let response = self
            .http
            .get(self.device_url(device, "/pairing"))
            .send()
            .await?;

        Ok(expect_success("poll pairing", response).await?.json().await?)
    }

    async fn open_connection(&self, device: InstanceUuid, jid: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.device_url(device, "/connection"))
            .json(&serde_json::json!({ "jid": jid }))
            .send()
            .await?;

        expect_success("connect", response).await?;

        Ok(())
    }

    async fn device_state(&self, device: InstanceUuid) -> Result<DeviceState, ClientError> {
        let response = self.http.get(self.device_url(device, "")).send().await?;

        Ok(expect_success("device state", response).await?.json().await?)
    }

    async fn close_connection(&self, device: InstanceUuid) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.device_url(device, "/connection"))
            .send()
            .await?;

        // Already gone counts as closed.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        expect_success("disconnect", response).await?;

        Ok(())
    }

    async fn unlink(&self, device: InstanceUuid) -> Result<(), ClientError> {
        let response = self.http.delete(self.device_url(device, "")).send().await?;

        expect_success("logout", response).await?;

        Ok(())
    }
}

async fn expect_success(operation: &str, response: Response) -> Result<Response, ClientError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();

    if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
        return Err(ClientError::Rejected(text));
    }

    Err(ClientError::UnexpectedResponse(format!(
        "{operation} request failed with status {status}: {text}"
    )))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum PairingState {
    Pending,
    Code {
        code: String,
        expires_in_ms: u64,
    },
    Paired {
        jid: String,
        phone: String,
        #[serde(default)]
        lid: Option<String>,
        #[serde(default)]
        device: Option<String>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
struct DeviceState {
    connected: bool,
    logged_in: bool,
    #[serde(default)]
    banned: Option<BanState>,
}

#[derive(Debug, Deserialize)]
struct BanState {
    reason: String,
    #[serde(default)]
    expires_at: Option<Timestamp>,
}

/// [`ConnectionClient`] backed by the device-session sidecar.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    api: BridgeApi,
    poll_interval: Duration,
}

impl BridgeClient {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            api: BridgeApi {
                http: Client::new(),
                base_url: config.base_url,
            },
            poll_interval: config.poll_interval,
        }
    }

    fn session(&self, device: InstanceUuid) -> (Session, Poller) {
        let (events, receiver) = mpsc::channel(EVENT_BUFFER);

        let session = Session {
            connection: Box::new(BridgeConnection {
                api: self.api.clone(),
                device,
            }),
            events: receiver,
        };

        let poller = Poller {
            api: self.api.clone(),
            device,
            interval: self.poll_interval,
            events,
        };

        (session, poller)
    }
}

#[async_trait]
impl ConnectionClient for BridgeClient {
    async fn pair(&self, instance: &InstanceRecord) -> Result<Session, ClientError> {
        self.api.start_pairing(instance.uuid).await?;

        let (session, poller) = self.session(instance.uuid);

        tokio::spawn(poller.watch_pairing());

        Ok(session)
    }

    async fn connect(&self, instance: &InstanceRecord) -> Result<Session, ClientError> {
        let jid = instance
            .jid
            .as_deref()
            .ok_or_else(|| ClientError::Rejected("device has not been paired".to_string()))?;

        self.api.open_connection(instance.uuid, jid).await?;

        let (session, poller) = self.session(instance.uuid);

        tokio::spawn(poller.watch_device());

        Ok(session)
    }

    async fn logout(&self, instance: &InstanceRecord) -> Result<(), ClientError> {
        self.api.unlink(instance.uuid).await
    }
}

/// Background task turning sidecar polls into session events. It stops as
/// soon as the session's event receiver is dropped.
struct Poller {
    api: BridgeApi,
    device: InstanceUuid,
    interval: Duration,
    events: mpsc::Sender<ClientEvent>,
}

impl Poller {
    /// Waits one interval. Returns `false` once nobody is listening.
    async fn tick(&self) -> bool {
        tokio::select! {
            () = self.events.closed() => false,
            () = time::sleep(self.interval) => true,
        }
    }

    async fn emit(&self, event: ClientEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    async fn watch_pairing(self) {
        let mut last_code: Option<String> = None;
        let mut failures = 0_u32;

        while self.tick().await {
            let state = match self.api.pairing_state(self.device).await {
                Ok(state) => {
                    failures = 0;
                    state
                }
                Err(error) => {
                    failures = failures.saturating_add(1);

                    warn!(instance_uuid = %self.device, failures, "pairing poll failed: {error}");

                    if failures >= MAX_POLL_FAILURES {
                        self.emit(ClientEvent::PairingFailed {
                            reason: "device bridge unreachable".to_string(),
                        })
                        .await;

                        return;
                    }

                    continue;
                }
            };

            match state {
                PairingState::Pending => {}
                PairingState::Code {
                    code,
                    expires_in_ms,
                } => {
                    if last_code.as_deref() == Some(code.as_str()) {
                        continue;
                    }

                    last_code = Some(code.clone());

                    let event = ClientEvent::QrCode {
                        code,
                        expires_in: Duration::from_millis(expires_in_ms),
                    };

                    if !self.emit(event).await {
                        return;
                    }
                }
                PairingState::Paired {
                    jid,
                    phone,
                    lid,
                    device,
                } => {
                    debug!(instance_uuid = %self.device, "sidecar reported pairing");

                    let identity = DeviceIdentity {
                        jid,
                        phone,
                        lid,
                        device,
                    };

                    if self.emit(ClientEvent::Paired(identity)).await {
                        self.watch_device().await;
                    }

                    return;
                }
                PairingState::Failed { reason } => {
                    self.emit(ClientEvent::PairingFailed { reason }).await;

                    return;
                }
            }
        }
    }

    async fn watch_device(self) {
        let mut failures = 0_u32;

        while self.tick().await {
            let state = match self.api.device_state(self.device).await {
                Ok(state) => {
                    failures = 0;
                    state
                }
                Err(error) => {
                    failures = failures.saturating_add(1);

                    warn!(instance_uuid = %self.device, failures, "liveness poll failed: {error}");

                    if failures >= MAX_POLL_FAILURES {
                        self.emit(ClientEvent::Disconnected).await;

                        return;
                    }

                    continue;
                }
            };

            let event = if let Some(ban) = state.banned {
                ClientEvent::Banned {
                    reason: ban.reason,
                    expires_at: ban.expires_at,
                }
            } else if !state.logged_in {
                ClientEvent::LoggedOut {
                    reason: "device unlinked".to_string(),
                }
            } else if !state.connected {
                ClientEvent::Disconnected
            } else {
                continue;
            };

            self.emit(event).await;

            return;
        }
    }
}

/// One sidecar-held session.
#[derive(Debug)]
struct BridgeConnection {
    api: BridgeApi,
    device: InstanceUuid,
}

#[async_trait]
impl Connection for BridgeConnection {
    async fn is_alive(&self) -> bool {
        match self.api.device_state(self.device).await {
            Ok(state) => state.connected && state.banned.is_none(),
            Err(error) => {
                debug!(instance_uuid = %self.device, "liveness probe failed: {error}");

                false
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        self.api.close_connection(self.device).await
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.api.unlink(self.device).await
    }
}
