//! Session Orchestrator
//!
//! Drives every instance through its connection lifecycle. Each transition
//! runs under the instance's orchestration lock, checks its guard, calls the
//! connection client, publishes the new state to the shared handle, and then
//! persists it. In-memory state is authoritative; a failed persist surfaces as
//! [`SessionError::Storage`] without rolling the transition back.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::{
    sync::{MutexGuard, mpsc},
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
    domain::instances::{
        InstancesRepository, InstancesRepositoryError,
        data::{InstanceFilter, NewInstance, normalize_instance_name},
        records::{InstanceRecord, InstanceStatus, InstanceUuid},
        token::generate_instance_token,
    },
    sessions::{
        client::{ClientEvent, Connection, ConnectionClient},
        errors::SessionError,
        guards,
        handle::{InstanceHandle, SessionSlot},
        registry::InstanceRegistry,
        service::{SessionService, SessionStats},
    },
};

/// Bounds applied to client calls and QR polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Default bound on opening a session for a paired device.
    pub connect_timeout: Duration,

    /// Default bound on a pairing flow, from start until the device is paired.
    pub pair_timeout: Duration,

    /// How long a QR poll waits for the first payload.
    pub qr_wait_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            pair_timeout: Duration::from_secs(30),
            qr_wait_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
pub struct SessionOrchestrator {
    registry: Arc<InstanceRegistry>,
    repository: Arc<dyn InstancesRepository>,
    client: Arc<dyn ConnectionClient>,
    config: SessionConfig,
}

impl Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SessionOrchestrator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionOrchestrator {
    #[must_use]
    pub fn new(
        registry: Arc<InstanceRegistry>,
        repository: Arc<dyn InstancesRepository>,
        client: Arc<dyn ConnectionClient>,
        config: SessionConfig,
    ) -> Self {
        Self {
            registry,
            repository,
            client,
            config,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Reconnects every instance that was connected when it was last persisted.
    ///
    /// Individual failures are logged and skipped. Returns how many sessions
    /// were reopened.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Lookup`] when the persisted instances cannot be
    /// listed.
    #[tracing::instrument(name = "sessions.restore", skip(self), err)]
    pub async fn restore(&self) -> Result<usize, SessionError> {
        let instances = self
            .repository
            .list(InstanceFilter::Status(InstanceStatus::Connected))
            .await
            .map_err(SessionError::Lookup)?;

        let mut restored = 0_usize;

        for instance in instances {
            let uuid = instance.uuid;

            self.registry.get_or_add(instance.rehydrated());

            match self.connect(uuid, None).await {
                Ok(_) => restored = restored.saturating_add(1),
                Err(error) => {
                    warn!(instance_uuid = %uuid, "failed to restore session: {error}");
                }
            }
        }

        info!(restored, "restored sessions");

        Ok(restored)
    }

    /// Closes every live connection without persisting, so the stored statuses
    /// still describe which sessions to restore on the next boot.
    #[tracing::instrument(name = "sessions.shutdown", skip(self))]
    pub async fn shutdown(&self) -> usize {
        let mut closed = 0_usize;

        for handle in self.registry.handles() {
            let mut slot = handle.lock().await;

            if let Some(connection) = slot.close() {
                close_quietly(handle.uuid(), connection.as_ref()).await;

                closed = closed.saturating_add(1);
            }
        }

        info!(closed, "closed live sessions");

        closed
    }

    async fn resolve_handle(&self, uuid: InstanceUuid) -> Result<Arc<InstanceHandle>, SessionError> {
        if let Some(handle) = self.registry.get(uuid) {
            return Ok(handle);
        }

        let instance = self
            .repository
            .get(InstanceFilter::Uuid(uuid))
            .await
            .map_err(|source| SessionError::lookup("resolve", uuid, source))?;

        debug!(instance_uuid = %uuid, "loaded instance from storage");

        Ok(self.registry.get_or_add(instance.rehydrated()))
    }

    /// Takes the instance lock, refusing handles retired by a deletion that
    /// ran while this caller was queued.
    async fn acquire(handle: &InstanceHandle) -> Result<MutexGuard<'_, SessionSlot>, SessionError> {
        let slot = handle.lock().await;

        if slot.is_retired() {
            return Err(SessionError::NotFound);
        }

        Ok(slot)
    }

    async fn persist(
        &self,
        operation: &'static str,
        instance: &InstanceRecord,
    ) -> Result<(), SessionError> {
        self.repository.save(instance).await.map_err(|source| {
            error!(
                instance_uuid = %instance.uuid,
                operation,
                "failed to persist instance: {source}"
            );

            SessionError::storage(operation, instance.uuid, source)
        })
    }

    /// Persists from a context with no caller to report to.
    async fn persist_logged(&self, operation: &'static str, instance: &InstanceRecord) {
        if self.persist(operation, instance).await.is_err() {
            debug!(instance_uuid = %instance.uuid, operation, "keeping in-memory state");
        }
    }

    /// Lifts a ban whose expiry has passed. Must run under the instance lock.
    async fn expire_ban(&self, handle: &InstanceHandle) -> Result<(), SessionError> {
        if !handle.snapshot().ban_expired(Timestamp::now()) {
            return Ok(());
        }

        let lifted = handle.publish(lift_ban);

        info!(instance_uuid = %handle.uuid(), status = %lifted.status, "ban expired");

        self.persist("ban_expiry", &lifted).await
    }

    /// `pairing_deadline` bounds how long the session may go without pairing.
    fn drain_spawner(
        &self,
        handle: &Arc<InstanceHandle>,
        pairing_deadline: Option<Instant>,
    ) -> impl FnOnce(u64, mpsc::Receiver<ClientEvent>) -> JoinHandle<()> + use<> {
        let orchestrator = self.clone();
        let handle = Arc::clone(handle);

        move |generation, events| {
            tokio::spawn(orchestrator.drain(handle, generation, events, pairing_deadline))
        }
    }

    async fn drain(
        self,
        handle: Arc<InstanceHandle>,
        generation: u64,
        mut events: mpsc::Receiver<ClientEvent>,
        mut pairing_deadline: Option<Instant>,
    ) {
        loop {
            let next = match pairing_deadline {
                Some(deadline) => match time::timeout_at(deadline, events.recv()).await {
                    Ok(next) => next,
                    Err(_elapsed) => {
                        self.expire_pairing(&handle, generation).await;

                        return;
                    }
                },
                None => events.recv().await,
            };

            let Some(event) = next else {
                break;
            };

            if matches!(event, ClientEvent::Paired(_)) {
                pairing_deadline = None;
            }

            if !self.apply_event(&handle, generation, event).await {
                return;
            }
        }

        self.close_drained(&handle, generation).await;
    }

    /// Abandons a pairing flow that outlived its deadline.
    async fn expire_pairing(&self, handle: &InstanceHandle, generation: u64) {
        let mut slot = handle.lock().await;

        if slot.generation() != generation || handle.status() != InstanceStatus::Pairing {
            return;
        }

        let uuid = handle.uuid();

        if let Some(connection) = slot.release() {
            close_quietly(uuid, connection.as_ref()).await;
        }

        let expired = handle.publish(|instance| {
            instance.clear_qr_code();
            instance.status = instance.idle_status();
            instance.reason = Some("pairing timed out".to_string());
        });

        warn!(instance_uuid = %uuid, status = %expired.status, "pairing timed out");

        self.persist_logged("pair", &expired).await;
    }

    /// Applies one client event. Returns whether the session is still current
    /// and its drain should keep running.
    #[expect(clippy::too_many_lines, reason = "one arm per client event")]
    async fn apply_event(
        &self,
        handle: &InstanceHandle,
        generation: u64,
        event: ClientEvent,
    ) -> bool {
        let mut slot = handle.lock().await;

        if slot.generation() != generation {
            debug!(instance_uuid = %handle.uuid(), "dropping event from a superseded session");

            return false;
        }

        let uuid = handle.uuid();
        let status = handle.status();

        match event {
            ClientEvent::QrCode { code, expires_in } => {
                if status == InstanceStatus::Pairing {
                    let expires_at = Timestamp::now().checked_add(expires_in).ok();

                    handle.publish(|instance| {
                        instance.qr_code = Some(code);
                        instance.qr_expires_at = expires_at;
                    });

                    debug!(instance_uuid = %uuid, "pairing code rotated");
                }

                true
            }
            ClientEvent::Paired(identity) => {
                if status != InstanceStatus::Pairing {
                    warn!(instance_uuid = %uuid, %status, "ignoring pairing outside of a pairing flow");

                    return true;
                }

                let now = Timestamp::now();

                let paired = handle.publish(|instance| {
                    instance.jid = Some(identity.jid);
                    instance.phone = Some(identity.phone);
                    instance.lid = identity.lid;
                    instance.device = identity.device;
                    instance.status = InstanceStatus::Connected;
                    instance.reason = None;
                    instance.last_login_at = Some(now);
                    instance.last_connected_at = Some(now);
                    instance.clear_qr_code();
                });

                info!(instance_uuid = %uuid, jid = ?paired.jid, "pairing completed");

                self.persist_logged("pair", &paired).await;

                true
            }
            ClientEvent::PairingFailed { reason } => {
                if let Some(connection) = slot.release() {
                    close_quietly(uuid, connection.as_ref()).await;
                }

                let failed = handle.publish(|instance| {
                    instance.clear_qr_code();
                    instance.status = instance.idle_status();
                    instance.reason = Some(reason);
                });

                warn!(instance_uuid = %uuid, reason = ?failed.reason, "pairing failed");

                self.persist_logged("pair", &failed).await;

                false
            }
            ClientEvent::Disconnected => {
                slot.release();

                let disconnected = handle.publish(|instance| {
                    instance.clear_qr_code();
                    instance.status = instance.idle_status();
                });

                info!(instance_uuid = %uuid, status = %disconnected.status, "session dropped");

                self.persist_logged("disconnect", &disconnected).await;

                false
            }
            ClientEvent::LoggedOut { reason } => {
                slot.release();

                let logged_out = handle.publish(|instance| {
                    instance.clear_identity();
                    instance.status = InstanceStatus::LoggedOut;
                    instance.reason = Some(reason);
                });

                warn!(instance_uuid = %uuid, reason = ?logged_out.reason, "device unlinked remotely");

                self.persist_logged("logout", &logged_out).await;

                false
            }
            ClientEvent::Banned { reason, expires_at } => {
                slot.release();

                let banned = handle.publish(|instance| {
                    instance.clear_qr_code();
                    instance.status = InstanceStatus::Banned;
                    instance.reason = Some(reason);
                    instance.banned_at = Some(Timestamp::now());
                    instance.ban_expires_at = expires_at;
                });

                warn!(
                    instance_uuid = %uuid,
                    reason = ?banned.reason,
                    expires_at = ?banned.ban_expires_at,
                    "instance banned"
                );

                self.persist_logged("ban", &banned).await;

                false
            }
        }
    }

    /// Settles an instance whose event stream ended without a terminal event.
    async fn close_drained(&self, handle: &InstanceHandle, generation: u64) {
        let mut slot = handle.lock().await;

        if slot.generation() != generation {
            return;
        }

        slot.release();

        if !matches!(
            handle.status(),
            InstanceStatus::Connected | InstanceStatus::Pairing
        ) {
            return;
        }

        let closed = handle.publish(|instance| {
            instance.clear_qr_code();
            instance.status = instance.idle_status();
            instance.reason = Some("session closed".to_string());
        });

        info!(instance_uuid = %handle.uuid(), status = %closed.status, "session stream ended");

        self.persist_logged("disconnect", &closed).await;
    }

    /// Closes and forgets the slot's connection, settling the published state.
    async fn close_session(handle: &InstanceHandle, slot: &mut SessionSlot) {
        if let Some(connection) = slot.close() {
            close_quietly(handle.uuid(), connection.as_ref()).await;

            handle.publish(|instance| {
                instance.clear_qr_code();
                instance.status = instance.idle_status();
            });
        }
    }
}

fn lift_ban(instance: &mut InstanceRecord) {
    instance.clear_ban();
    instance.reason = None;
    instance.status = instance.idle_status();
}

async fn close_quietly(uuid: InstanceUuid, connection: &dyn Connection) {
    if let Err(error) = connection.disconnect().await {
        warn!(instance_uuid = %uuid, "failed to close connection: {error}");
    }
}

#[async_trait]
impl SessionService for SessionOrchestrator {
    #[tracing::instrument(name = "sessions.resolve", skip_all, fields(instance_uuid = %uuid), err)]
    async fn resolve(&self, uuid: InstanceUuid) -> Result<InstanceRecord, SessionError> {
        Ok(self.resolve_handle(uuid).await?.snapshot())
    }

    #[tracing::instrument(name = "sessions.resolve_by_token", skip_all, err)]
    async fn resolve_by_token(&self, token: &str) -> Result<InstanceRecord, SessionError> {
        let instance = self
            .repository
            .get(InstanceFilter::Token(token.to_string()))
            .await
            .map_err(|source| match source {
                InstancesRepositoryError::NotFound => SessionError::UnknownToken,
                source => SessionError::Lookup(source),
            })?;

        let snapshot = self.registry.get_or_add(instance.rehydrated()).snapshot();

        // A renewal that failed to persist leaves storage one token behind.
        if snapshot.token != token {
            return Err(SessionError::UnknownToken);
        }

        Ok(snapshot)
    }

    #[tracing::instrument(
        name = "sessions.pair",
        skip_all,
        fields(instance_uuid = %uuid),
        err
    )]
    async fn pair(
        &self,
        uuid: InstanceUuid,
        timeout: Option<Duration>,
    ) -> Result<InstanceRecord, SessionError> {
        let handle = self.resolve_handle(uuid).await?;

        let mut slot = Self::acquire(&handle).await?;

        self.expire_ban(&handle).await?;

        let instance = handle.snapshot();

        guards::check_pair(&instance)?;

        let limit = timeout.unwrap_or(self.config.pair_timeout);
        let deadline = Instant::now().checked_add(limit);

        let session = match time::timeout(limit, self.client.pair(&instance)).await {
            Ok(Ok(session)) => session,
            Ok(Err(source)) => {
                return Err(SessionError::Client {
                    operation: "pair",
                    instance: uuid,
                    source,
                });
            }
            Err(_elapsed) => {
                warn!(instance_uuid = %uuid, ?limit, "pairing did not start in time");

                return Err(SessionError::Timeout { operation: "pair" });
            }
        };

        slot.install(session, self.drain_spawner(&handle, deadline));

        let pairing = handle.publish(|instance| {
            instance.clear_qr_code();
            instance.status = InstanceStatus::Pairing;
            instance.reason = None;
        });

        info!(instance_uuid = %uuid, "pairing started");

        self.persist("pair", &pairing).await?;

        Ok(pairing)
    }

    #[tracing::instrument(
        name = "sessions.connect",
        skip_all,
        fields(instance_uuid = %uuid),
        err
    )]
    async fn connect(
        &self,
        uuid: InstanceUuid,
        timeout: Option<Duration>,
    ) -> Result<InstanceRecord, SessionError> {
        let handle = self.resolve_handle(uuid).await?;

        // Concurrent attempts are rejected rather than queued behind the lock.
        if handle.status() == InstanceStatus::Connecting {
            return Err(SessionError::IsConnecting);
        }

        let mut slot = Self::acquire(&handle).await?;

        self.expire_ban(&handle).await?;

        guards::check_connect(&handle.snapshot())?;

        let connecting = handle.publish(|instance| {
            instance.status = InstanceStatus::Connecting;
            instance.reason = None;
        });

        let limit = timeout.unwrap_or(self.config.connect_timeout);

        let outcome = time::timeout(limit, self.client.connect(&connecting)).await;

        let session = match outcome {
            Ok(Ok(session)) => session,
            Ok(Err(source)) => {
                let reverted = handle.publish(|instance| instance.status = instance.idle_status());

                self.persist_logged("connect", &reverted).await;

                return Err(SessionError::Client {
                    operation: "connect",
                    instance: uuid,
                    source,
                });
            }
            Err(_elapsed) => {
                let reverted = handle.publish(|instance| instance.status = instance.idle_status());

                warn!(instance_uuid = %uuid, ?limit, "connection attempt timed out");

                self.persist_logged("connect", &reverted).await;

                return Err(SessionError::Timeout {
                    operation: "connect",
                });
            }
        };

        slot.install(session, self.drain_spawner(&handle, None));

        let connected = handle.publish(|instance| {
            instance.status = InstanceStatus::Connected;
            instance.last_connected_at = Some(Timestamp::now());
        });

        info!(instance_uuid = %uuid, "instance connected");

        self.persist("connect", &connected).await?;

        Ok(connected)
    }

    #[tracing::instrument(name = "sessions.disconnect", skip_all, fields(instance_uuid = %uuid), err)]
    async fn disconnect(&self, uuid: InstanceUuid) -> Result<InstanceRecord, SessionError> {
        let handle = self.resolve_handle(uuid).await?;

        let mut slot = Self::acquire(&handle).await?;

        guards::check_disconnect(&handle.snapshot())?;

        if let Some(connection) = slot.close() {
            close_quietly(uuid, connection.as_ref()).await;
        }

        let disconnected = handle.publish(|instance| {
            instance.status = InstanceStatus::Disconnected;
            instance.reason = None;
        });

        info!(instance_uuid = %uuid, "instance disconnected");

        self.persist("disconnect", &disconnected).await?;

        Ok(disconnected)
    }

    #[tracing::instrument(name = "sessions.logout", skip_all, fields(instance_uuid = %uuid), err)]
    async fn logout(&self, uuid: InstanceUuid) -> Result<InstanceRecord, SessionError> {
        let handle = self.resolve_handle(uuid).await?;

        let mut slot = Self::acquire(&handle).await?;

        let instance = handle.snapshot();

        guards::check_logout(&instance)?;

        // A paired device with no open session is unlinked directly.
        let unlinked = match slot.connection() {
            Some(connection) if instance.status == InstanceStatus::Connected => {
                connection.logout().await
            }
            None if instance.is_logged_in() => self.client.logout(&instance).await,
            _ => Ok(()),
        };

        unlinked.map_err(|source| SessionError::Client {
            operation: "logout",
            instance: uuid,
            source,
        })?;

        if let Some(connection) = slot.close()
            && instance.status != InstanceStatus::Connected
        {
            close_quietly(uuid, connection.as_ref()).await;
        }

        let logged_out = handle.publish(|instance| {
            instance.clear_identity();
            instance.status = InstanceStatus::LoggedOut;
            instance.reason = None;
        });

        info!(instance_uuid = %uuid, "instance logged out");

        self.persist("logout", &logged_out).await?;

        Ok(logged_out)
    }

    #[tracing::instrument(name = "sessions.qr_code", skip_all, fields(instance_uuid = %uuid), err)]
    async fn qr_code(&self, uuid: InstanceUuid) -> Result<String, SessionError> {
        let handle = self.resolve_handle(uuid).await?;

        let mut updates = handle.subscribe();

        let settled = time::timeout(self.config.qr_wait_timeout, async {
            updates
                .wait_for(|instance| guards::qr_settled(instance, Timestamp::now()))
                .await
                .map(|instance| instance.clone())
        })
        .await;

        let instance = match settled {
            Ok(Ok(instance)) => instance,
            Ok(Err(_)) | Err(_) => handle.snapshot(),
        };

        guards::qr_outcome(&instance, Timestamp::now())
    }

    #[tracing::instrument(name = "sessions.ping", skip_all, fields(instance_uuid = %uuid), err)]
    async fn ping(&self, uuid: InstanceUuid) -> Result<InstanceStatus, SessionError> {
        let handle = self.resolve_handle(uuid).await?;

        // A transition in flight owns the connection; report what it has published.
        let Ok(mut slot) = handle.try_lock() else {
            return Ok(handle.status());
        };

        if slot.is_retired() {
            return Err(SessionError::NotFound);
        }

        let status = handle.status();

        if status != InstanceStatus::Connected {
            return Ok(status);
        }

        let alive = match slot.connection() {
            Some(connection) => connection.is_alive().await,
            None => false,
        };

        if alive {
            return Ok(status);
        }

        if let Some(connection) = slot.close() {
            close_quietly(uuid, connection.as_ref()).await;
        }

        let lost = handle.publish(|instance| {
            instance.status = instance.idle_status();
            instance.reason = Some("connection lost".to_string());
        });

        warn!(instance_uuid = %uuid, "connection found dead on ping");

        self.persist_logged("ping", &lost).await;

        Ok(lost.status)
    }

    #[tracing::instrument(
        name = "sessions.create_instance",
        skip_all,
        fields(instance_uuid = tracing::field::Empty),
        err
    )]
    async fn create_instance(&self, name: String) -> Result<InstanceRecord, SessionError> {
        let name = normalize_instance_name(&name).ok_or(SessionError::InvalidName)?;

        let uuid = InstanceUuid::new();

        tracing::Span::current().record("instance_uuid", tracing::field::display(uuid));

        let instance = self
            .repository
            .create(NewInstance {
                uuid,
                name,
                token: generate_instance_token(),
            })
            .await
            .map_err(|source| SessionError::storage("create", uuid, source))?;

        self.registry.add(instance.clone())?;

        info!(instance_uuid = %uuid, "created instance");

        Ok(instance)
    }

    #[tracing::instrument(name = "sessions.rename", skip_all, fields(instance_uuid = %uuid), err)]
    async fn rename(
        &self,
        uuid: InstanceUuid,
        name: String,
    ) -> Result<InstanceRecord, SessionError> {
        let name = normalize_instance_name(&name).ok_or(SessionError::InvalidName)?;

        let handle = self.resolve_handle(uuid).await?;

        let _slot = Self::acquire(&handle).await?;

        let renamed = handle.publish(|instance| instance.name = name);

        self.persist("rename", &renamed).await?;

        Ok(renamed)
    }

    #[tracing::instrument(name = "sessions.renew_token", skip_all, fields(instance_uuid = %uuid), err)]
    async fn renew_token(&self, uuid: InstanceUuid) -> Result<InstanceRecord, SessionError> {
        let handle = self.resolve_handle(uuid).await?;

        let _slot = Self::acquire(&handle).await?;

        let token = generate_instance_token();

        let renewed = handle.publish(|instance| instance.token = token);

        info!(instance_uuid = %uuid, "renewed instance token");

        self.persist("renew_token", &renewed).await?;

        Ok(renewed)
    }

    #[tracing::instrument(name = "sessions.unban", skip_all, fields(instance_uuid = %uuid), err)]
    async fn unban(&self, uuid: InstanceUuid) -> Result<InstanceRecord, SessionError> {
        let handle = self.resolve_handle(uuid).await?;

        let _slot = Self::acquire(&handle).await?;

        guards::check_unban(&handle.snapshot())?;

        let unbanned = handle.publish(lift_ban);

        info!(instance_uuid = %uuid, status = %unbanned.status, "instance unbanned");

        self.persist("unban", &unbanned).await?;

        Ok(unbanned)
    }

    #[tracing::instrument(name = "sessions.delete_instance", skip_all, fields(instance_uuid = %uuid), err)]
    async fn delete_instance(&self, uuid: InstanceUuid) -> Result<(), SessionError> {
        let handle = self.resolve_handle(uuid).await?;

        let mut slot = Self::acquire(&handle).await?;

        Self::close_session(&handle, &mut slot).await;

        self.repository
            .delete(uuid)
            .await
            .map_err(|source| SessionError::lookup("delete", uuid, source))?;

        slot.retire();

        self.registry.remove(uuid);

        info!(instance_uuid = %uuid, "deleted instance");

        Ok(())
    }

    fn stats(&self) -> SessionStats {
        let handles = self.registry.handles();
        let statuses: Vec<InstanceStatus> = handles.iter().map(|handle| handle.status()).collect();

        SessionStats {
            cached: handles.len(),
            by_status: InstanceStatus::ALL
                .into_iter()
                .map(|status| {
                    let count = statuses.iter().filter(|current| **current == status).count();

                    (status, count)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use testresult::TestResult;
    use tokio::task::JoinSet;

    use crate::{
        domain::instances::MockInstancesRepository,
        sessions::client::DeviceIdentity,
        test::helpers::{FakeClient, make_instance, make_paired_instance, saving_repository},
    };

    use super::*;

    fn orchestrator(client: &Arc<FakeClient>, repository: MockInstancesRepository) -> SessionOrchestrator {
        let client: Arc<dyn ConnectionClient> = Arc::clone(client) as Arc<dyn ConnectionClient>;

        SessionOrchestrator::new(
            Arc::new(InstanceRegistry::new()),
            Arc::new(repository),
            client,
            SessionConfig {
                connect_timeout: Duration::from_secs(1),
                pair_timeout: Duration::from_secs(1),
                qr_wait_timeout: Duration::from_millis(200),
            },
        )
    }

    fn seed(orchestrator: &SessionOrchestrator, instance: InstanceRecord) -> TestResult<InstanceUuid> {
        let uuid = instance.uuid;

        orchestrator.registry().add(instance)?;

        Ok(uuid)
    }

    async fn wait_until(
        orchestrator: &SessionOrchestrator,
        uuid: InstanceUuid,
        mut done: impl FnMut(&InstanceRecord) -> bool,
    ) -> TestResult<InstanceRecord> {
        let handle = orchestrator.registry().get(uuid).ok_or("instance not cached")?;
        let mut updates = handle.subscribe();

        let instance = time::timeout(Duration::from_secs(2), updates.wait_for(|instance| done(instance)))
            .await??
            .clone();

        Ok(instance)
    }

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            jid: "5511988887777@s.whatsapp.net".to_string(),
            phone: "5511988887777".to_string(),
            lid: Some("12345@lid".to_string()),
            device: Some("Chrome".to_string()),
        }
    }

    #[tokio::test]
    async fn fresh_instance_pairs_then_connects() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_instance(InstanceStatus::LoggedOut))?;

        let result = orchestrator.connect(uuid, None).await;

        assert!(matches!(result, Err(SessionError::NotLoggedIn)), "got {result:?}");

        let pairing = orchestrator.pair(uuid, None).await?;

        assert_eq!(pairing.status, InstanceStatus::Pairing);

        let events = client.events().await?;

        events
            .send(ClientEvent::QrCode {
                code: "2@abc".to_string(),
                expires_in: Duration::from_secs(20),
            })
            .await?;

        assert_eq!(orchestrator.qr_code(uuid).await?, "2@abc");

        events.send(ClientEvent::Paired(identity())).await?;

        let connected = wait_until(&orchestrator, uuid, |instance| {
            instance.status == InstanceStatus::Connected
        })
        .await?;

        assert_eq!(connected.jid.as_deref(), Some("5511988887777@s.whatsapp.net"));
        assert_eq!(connected.phone.as_deref(), Some("5511988887777"));
        assert!(connected.last_login_at.is_some());
        assert!(connected.qr_code.is_none());
        assert_eq!(client.pairs(), 1);
        assert_eq!(client.connects(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn disconnect_twice_is_rejected() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        let connected = orchestrator.connect(uuid, None).await?;

        assert_eq!(connected.status, InstanceStatus::Connected);
        assert!(connected.last_connected_at.is_some());

        let disconnected = orchestrator.disconnect(uuid).await?;

        assert_eq!(disconnected.status, InstanceStatus::Disconnected);
        assert!(disconnected.jid.is_some(), "disconnect keeps the pairing");

        let again = orchestrator.disconnect(uuid).await;

        assert!(matches!(again, Err(SessionError::AlreadyDisconnected)), "got {again:?}");

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_connects_open_one_session() -> TestResult {
        let client = Arc::new(FakeClient::with_delay(Duration::from_millis(100)));
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        let mut attempts = JoinSet::new();

        for _ in 0..8 {
            let orchestrator = orchestrator.clone();

            attempts.spawn(async move { orchestrator.connect(uuid, None).await });
        }

        let mut successes = 0;

        while let Some(result) = attempts.join_next().await {
            match result? {
                Ok(_) => successes += 1,
                Err(SessionError::IsConnecting | SessionError::AlreadyConnected) => {}
                Err(error) => return Err(format!("unexpected error: {error}").into()),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(client.connects(), 1);
        assert_eq!(orchestrator.resolve(uuid).await?.status, InstanceStatus::Connected);

        Ok(())
    }

    #[tokio::test]
    async fn pair_on_connected_instance_is_rejected() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Connected))?;

        let result = orchestrator.pair(uuid, None).await;

        assert!(matches!(result, Err(SessionError::AlreadyLoggedIn)), "got {result:?}");
        assert_eq!(client.pairs(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn qr_code_before_first_payload_is_missing() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_instance(InstanceStatus::LoggedOut))?;

        orchestrator.pair(uuid, None).await?;

        let result = orchestrator.qr_code(uuid).await;

        assert!(matches!(result, Err(SessionError::NoQrCode)), "got {result:?}");

        Ok(())
    }

    #[tokio::test]
    async fn qr_poll_sees_pairing_complete() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_instance(InstanceStatus::LoggedOut))?;

        orchestrator.pair(uuid, None).await?;

        let poll = {
            let orchestrator = orchestrator.clone();

            tokio::spawn(async move { orchestrator.qr_code(uuid).await })
        };

        client.events().await?.send(ClientEvent::Paired(identity())).await?;

        let result = poll.await?;

        assert!(matches!(result, Err(SessionError::AlreadyPaired)), "got {result:?}");

        Ok(())
    }

    #[tokio::test]
    async fn qr_code_outside_pairing_is_rejected() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_instance(InstanceStatus::LoggedOut))?;

        let result = orchestrator.qr_code(uuid).await;

        assert!(matches!(result, Err(SessionError::NotPairing)), "got {result:?}");

        Ok(())
    }

    #[tokio::test]
    async fn pairing_failure_returns_to_logged_out() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_instance(InstanceStatus::LoggedOut))?;

        orchestrator.pair(uuid, None).await?;

        client
            .events()
            .await?
            .send(ClientEvent::PairingFailed {
                reason: "codes exhausted".to_string(),
            })
            .await?;

        let failed = wait_until(&orchestrator, uuid, |instance| {
            instance.status == InstanceStatus::LoggedOut
        })
        .await?;

        assert_eq!(failed.reason.as_deref(), Some("codes exhausted"));
        assert!(failed.qr_code.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn unfinished_pairing_times_out() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_instance(InstanceStatus::LoggedOut))?;

        orchestrator.pair(uuid, Some(Duration::from_millis(100))).await?;

        client
            .events()
            .await?
            .send(ClientEvent::QrCode {
                code: "2@abc".to_string(),
                expires_in: Duration::from_secs(20),
            })
            .await?;

        let expired = wait_until(&orchestrator, uuid, |instance| {
            instance.status == InstanceStatus::LoggedOut
        })
        .await?;

        assert_eq!(expired.reason.as_deref(), Some("pairing timed out"));
        assert!(expired.qr_code.is_none());

        let result = orchestrator.qr_code(uuid).await;

        assert!(matches!(result, Err(SessionError::NotPairing)), "got {result:?}");

        Ok(())
    }

    #[tokio::test]
    async fn completed_pairing_outlives_its_deadline() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_instance(InstanceStatus::LoggedOut))?;

        orchestrator.pair(uuid, Some(Duration::from_millis(50))).await?;

        client.events().await?.send(ClientEvent::Paired(identity())).await?;

        wait_until(&orchestrator, uuid, |instance| {
            instance.status == InstanceStatus::Connected
        })
        .await?;

        time::sleep(Duration::from_millis(150)).await;

        assert_eq!(orchestrator.resolve(uuid).await?.status, InstanceStatus::Connected);

        Ok(())
    }

    #[tokio::test]
    async fn connect_timeout_reverts_to_disconnected() -> TestResult {
        let client = Arc::new(FakeClient::with_delay(Duration::from_millis(500)));
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        let result = orchestrator
            .connect(uuid, Some(Duration::from_millis(20)))
            .await;

        assert!(
            matches!(result, Err(SessionError::Timeout { operation: "connect" })),
            "got {result:?}"
        );
        assert_eq!(orchestrator.resolve(uuid).await?.status, InstanceStatus::Disconnected);

        Ok(())
    }

    #[tokio::test]
    async fn connect_failure_reverts_and_reports_client_error() -> TestResult {
        let client = Arc::new(FakeClient::failing());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        let result = orchestrator.connect(uuid, None).await;

        assert!(
            matches!(result, Err(SessionError::Client { operation: "connect", .. })),
            "got {result:?}"
        );
        assert_eq!(orchestrator.resolve(uuid).await?.status, InstanceStatus::Disconnected);

        Ok(())
    }

    #[tokio::test]
    async fn ping_reports_live_and_dead_connections() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        orchestrator.connect(uuid, None).await?;

        assert_eq!(orchestrator.ping(uuid).await?, InstanceStatus::Connected);

        client.set_alive(false);

        assert_eq!(orchestrator.ping(uuid).await?, InstanceStatus::Disconnected);
        assert_eq!(
            orchestrator.resolve(uuid).await?.reason.as_deref(),
            Some("connection lost")
        );

        Ok(())
    }

    #[tokio::test]
    async fn ping_during_connect_reports_published_status() -> TestResult {
        let client = Arc::new(FakeClient::with_delay(Duration::from_millis(200)));
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        let connect = {
            let orchestrator = orchestrator.clone();

            tokio::spawn(async move { orchestrator.connect(uuid, None).await })
        };

        wait_until(&orchestrator, uuid, |instance| {
            instance.status == InstanceStatus::Connecting
        })
        .await?;

        assert_eq!(orchestrator.ping(uuid).await?, InstanceStatus::Connecting);

        connect.await??;

        assert_eq!(client.connects(), 1);
        assert_eq!(client.probes(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn ping_skips_probe_while_lock_is_held() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        orchestrator.connect(uuid, None).await?;

        client.set_alive(false);

        let handle = orchestrator.registry().get(uuid).ok_or("instance not cached")?;
        let held = handle.lock().await;

        assert_eq!(orchestrator.ping(uuid).await?, InstanceStatus::Connected);
        assert_eq!(client.probes(), 0);

        drop(held);

        assert_eq!(orchestrator.ping(uuid).await?, InstanceStatus::Disconnected);
        assert_eq!(client.probes(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn expired_ban_is_lifted_on_connect() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let now = Timestamp::now();

        let uuid = seed(
            &orchestrator,
            InstanceRecord {
                reason: Some("spam".to_string()),
                banned_at: Some(now - SignedDuration::from_hours(2)),
                ban_expires_at: Some(now - SignedDuration::from_mins(1)),
                ..make_paired_instance(InstanceStatus::Banned)
            },
        )?;

        let connected = orchestrator.connect(uuid, None).await?;

        assert_eq!(connected.status, InstanceStatus::Connected);
        assert!(connected.banned_at.is_none());
        assert!(connected.ban_expires_at.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn active_ban_blocks_pairing_and_logout() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let now = Timestamp::now();

        let uuid = seed(
            &orchestrator,
            InstanceRecord {
                reason: Some("spam".to_string()),
                banned_at: Some(now),
                ban_expires_at: Some(now + SignedDuration::from_hours(24)),
                ..make_instance(InstanceStatus::Banned)
            },
        )?;

        let pair = orchestrator.pair(uuid, None).await;

        assert!(
            matches!(pair, Err(SessionError::Banned { reason: Some(ref reason), .. }) if reason == "spam"),
            "got {pair:?}"
        );

        let logout = orchestrator.logout(uuid).await;

        assert!(matches!(logout, Err(SessionError::Banned { .. })), "got {logout:?}");
        assert_eq!(client.pairs(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn logout_unlinks_connected_device() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        orchestrator.connect(uuid, None).await?;

        let logged_out = orchestrator.logout(uuid).await?;

        assert_eq!(logged_out.status, InstanceStatus::LoggedOut);
        assert!(logged_out.jid.is_none());
        assert!(logged_out.phone.is_none());
        assert_eq!(client.unlinks(), 0, "the open session unlinks itself");

        let again = orchestrator.logout(uuid).await;

        assert!(matches!(again, Err(SessionError::AlreadyLoggedOut)), "got {again:?}");

        Ok(())
    }

    #[tokio::test]
    async fn logout_unlinks_disconnected_device() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        let logged_out = orchestrator.logout(uuid).await?;

        assert_eq!(logged_out.status, InstanceStatus::LoggedOut);
        assert!(logged_out.jid.is_none());
        assert!(logged_out.lid.is_none());
        assert_eq!(client.unlinks(), 1);
        assert_eq!(client.connects(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn failed_device_unlink_keeps_identity() -> TestResult {
        let client = Arc::new(FakeClient::with_failing_logout());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        let result = orchestrator.logout(uuid).await;

        assert!(
            matches!(result, Err(SessionError::Client { operation: "logout", .. })),
            "got {result:?}"
        );

        let instance = orchestrator.resolve(uuid).await?;

        assert_eq!(instance.status, InstanceStatus::Disconnected);
        assert!(instance.jid.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn failed_unlink_keeps_the_session() -> TestResult {
        let client = Arc::new(FakeClient::with_failing_logout());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        orchestrator.connect(uuid, None).await?;

        let result = orchestrator.logout(uuid).await;

        assert!(
            matches!(result, Err(SessionError::Client { operation: "logout", .. })),
            "got {result:?}"
        );

        let instance = orchestrator.resolve(uuid).await?;

        assert_eq!(instance.status, InstanceStatus::Connected);
        assert!(instance.jid.is_some());
        assert_eq!(orchestrator.ping(uuid).await?, InstanceStatus::Connected);

        Ok(())
    }

    #[tokio::test]
    async fn remote_events_update_state() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        orchestrator.connect(uuid, None).await?;

        client
            .events()
            .await?
            .send(ClientEvent::Banned {
                reason: "terms violation".to_string(),
                expires_at: None,
            })
            .await?;

        let banned = wait_until(&orchestrator, uuid, |instance| {
            instance.status == InstanceStatus::Banned
        })
        .await?;

        assert!(banned.banned_at.is_some());
        assert_eq!(banned.reason.as_deref(), Some("terms violation"));

        let unbanned = orchestrator.unban(uuid).await?;

        assert_eq!(unbanned.status, InstanceStatus::Disconnected);
        assert!(unbanned.banned_at.is_none());

        orchestrator.connect(uuid, None).await?;

        client
            .events()
            .await?
            .send(ClientEvent::LoggedOut {
                reason: "unlinked from phone".to_string(),
            })
            .await?;

        let logged_out = wait_until(&orchestrator, uuid, |instance| {
            instance.status == InstanceStatus::LoggedOut
        })
        .await?;

        assert!(logged_out.jid.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn ended_event_stream_disconnects() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        orchestrator.connect(uuid, None).await?;

        client.hang_up().await;

        let closed = wait_until(&orchestrator, uuid, |instance| {
            instance.status == InstanceStatus::Disconnected
        })
        .await?;

        assert_eq!(closed.reason.as_deref(), Some("session closed"));

        Ok(())
    }

    #[tokio::test]
    async fn persist_failure_keeps_in_memory_state() -> TestResult {
        let client = Arc::new(FakeClient::new());

        let mut repository = MockInstancesRepository::new();

        repository
            .expect_save()
            .returning(|_| Err(InstancesRepositoryError::Sql(sqlx::Error::PoolTimedOut)));

        let orchestrator = orchestrator(&client, repository);
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        let result = orchestrator.connect(uuid, None).await;

        assert!(
            matches!(result, Err(SessionError::Storage { operation: "connect", .. })),
            "got {result:?}"
        );
        assert_eq!(orchestrator.resolve(uuid).await?.status, InstanceStatus::Connected);

        Ok(())
    }

    #[tokio::test]
    async fn resolve_loads_once_and_normalizes() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let stored = make_paired_instance(InstanceStatus::Connected);
        let uuid = stored.uuid;

        let mut repository = MockInstancesRepository::new();

        repository
            .expect_get()
            .withf(move |filter| *filter == InstanceFilter::Uuid(uuid))
            .times(1)
            .returning(move |_| Ok(stored.clone()));

        let orchestrator = orchestrator(&client, repository);

        let first = orchestrator.resolve(uuid).await?;
        let second = orchestrator.resolve(uuid).await?;

        assert_eq!(first.status, InstanceStatus::Disconnected);
        assert_eq!(first, second);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_instances_and_tokens_are_reported() -> TestResult {
        let client = Arc::new(FakeClient::new());

        let mut repository = MockInstancesRepository::new();

        repository
            .expect_get()
            .returning(|_| Err(InstancesRepositoryError::NotFound));

        let orchestrator = orchestrator(&client, repository);

        let by_uuid = orchestrator.resolve(InstanceUuid::new()).await;
        let by_token = orchestrator.resolve_by_token("sb_unknown").await;

        assert!(matches!(by_uuid, Err(SessionError::NotFound)), "got {by_uuid:?}");
        assert!(matches!(by_token, Err(SessionError::UnknownToken)), "got {by_token:?}");

        Ok(())
    }

    #[tokio::test]
    async fn create_instance_validates_and_caches() -> TestResult {
        let client = Arc::new(FakeClient::new());

        let mut repository = MockInstancesRepository::new();

        repository.expect_create().times(1).returning(|instance| {
            Ok(InstanceRecord {
                uuid: instance.uuid,
                name: instance.name,
                token: instance.token,
                ..make_instance(InstanceStatus::LoggedOut)
            })
        });

        let orchestrator = orchestrator(&client, repository);

        let invalid = orchestrator.create_instance("   ".to_string()).await;

        assert!(matches!(invalid, Err(SessionError::InvalidName)), "got {invalid:?}");

        let created = orchestrator.create_instance("  Sales  ".to_string()).await?;

        assert_eq!(created.name, "Sales");
        assert_eq!(created.status, InstanceStatus::LoggedOut);
        assert!(created.token.starts_with("sb_"));
        assert!(orchestrator.registry().get(created.uuid).is_some());

        Ok(())
    }

    #[tokio::test]
    async fn rename_and_renew_token_update_metadata() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());
        let original = make_instance(InstanceStatus::LoggedOut);
        let uuid = seed(&orchestrator, original.clone())?;

        let renamed = orchestrator.rename(uuid, "Billing".to_string()).await?;

        assert_eq!(renamed.name, "Billing");

        let renewed = orchestrator.renew_token(uuid).await?;

        assert_ne!(renewed.token, original.token);

        let unban = orchestrator.unban(uuid).await;

        assert!(matches!(unban, Err(SessionError::NotBanned)), "got {unban:?}");

        Ok(())
    }

    #[tokio::test]
    async fn delete_instance_closes_and_evicts() -> TestResult {
        let client = Arc::new(FakeClient::new());

        let mut repository = saving_repository();

        repository.expect_delete().times(1).returning(|_| Ok(()));

        let orchestrator = orchestrator(&client, repository);
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        orchestrator.connect(uuid, None).await?;
        orchestrator.delete_instance(uuid).await?;

        assert!(orchestrator.registry().get(uuid).is_none());

        Ok(())
    }

    #[tokio::test]
    async fn transitions_queued_behind_delete_find_nothing() -> TestResult {
        let client = Arc::new(FakeClient::new());

        let mut repository = saving_repository();

        repository.expect_delete().times(1).returning(|_| Ok(()));

        let orchestrator = orchestrator(&client, repository);
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        let handle = orchestrator.registry().get(uuid).ok_or("instance not cached")?;
        let held = handle.lock().await;

        let delete = {
            let orchestrator = orchestrator.clone();

            tokio::spawn(async move { orchestrator.delete_instance(uuid).await })
        };

        time::sleep(Duration::from_millis(20)).await;

        let connect = {
            let orchestrator = orchestrator.clone();

            tokio::spawn(async move { orchestrator.connect(uuid, None).await })
        };

        time::sleep(Duration::from_millis(20)).await;

        drop(held);

        delete.await??;

        let result = connect.await?;

        assert!(matches!(result, Err(SessionError::NotFound)), "got {result:?}");
        assert_eq!(client.connects(), 0);
        assert!(orchestrator.registry().get(uuid).is_none());
        assert_eq!(orchestrator.shutdown().await, 0);

        Ok(())
    }

    #[tokio::test]
    async fn restore_reconnects_persisted_sessions() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let stored = make_paired_instance(InstanceStatus::Connected);
        let uuid = stored.uuid;

        let mut repository = saving_repository();

        repository
            .expect_list()
            .withf(|filter| *filter == InstanceFilter::Status(InstanceStatus::Connected))
            .returning(move |_| Ok(vec![stored.clone()]));

        let orchestrator = orchestrator(&client, repository);

        assert_eq!(orchestrator.restore().await?, 1);
        assert_eq!(client.connects(), 1);
        assert_eq!(orchestrator.resolve(uuid).await?.status, InstanceStatus::Connected);

        Ok(())
    }

    #[tokio::test]
    async fn shutdown_closes_without_persisting() -> TestResult {
        let client = Arc::new(FakeClient::new());

        let mut repository = MockInstancesRepository::new();

        // Only the connect transition itself is saved.
        repository.expect_save().times(1).returning(|_| Ok(()));

        let orchestrator = orchestrator(&client, repository);
        let uuid = seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        orchestrator.connect(uuid, None).await?;

        assert_eq!(orchestrator.shutdown().await, 1);
        assert_eq!(orchestrator.shutdown().await, 0);

        Ok(())
    }

    #[tokio::test]
    async fn stats_count_cached_instances_by_status() -> TestResult {
        let client = Arc::new(FakeClient::new());
        let orchestrator = orchestrator(&client, saving_repository());

        seed(&orchestrator, make_instance(InstanceStatus::LoggedOut))?;
        seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;
        seed(&orchestrator, make_paired_instance(InstanceStatus::Disconnected))?;

        let stats = orchestrator.stats();

        assert_eq!(stats.cached, 3);
        assert!(stats.by_status.contains(&(InstanceStatus::Disconnected, 2)));
        assert!(stats.by_status.contains(&(InstanceStatus::LoggedOut, 1)));
        assert!(stats.by_status.contains(&(InstanceStatus::Connected, 0)));

        Ok(())
    }
}
