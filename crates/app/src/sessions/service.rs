//! Session service.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;

use crate::{
    domain::instances::records::{InstanceRecord, InstanceStatus, InstanceUuid},
    sessions::errors::SessionError,
};

/// Point-in-time counts of cached instances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Instances currently cached in the registry.
    pub cached: usize,

    /// Cached instances per status, in [`InstanceStatus::ALL`] order.
    pub by_status: Vec<(InstanceStatus, usize)>,
}

#[automock]
#[async_trait]
/// Instance lifecycle and administration operations.
pub trait SessionService: Send + Sync {
    /// Returns the instance, loading it into the registry on a cache miss.
    async fn resolve(&self, uuid: InstanceUuid) -> Result<InstanceRecord, SessionError>;

    /// Returns the instance owning `token`.
    async fn resolve_by_token(&self, token: &str) -> Result<InstanceRecord, SessionError>;

    /// Starts pairing a device.
    async fn pair(
        &self,
        uuid: InstanceUuid,
        timeout: Option<Duration>,
    ) -> Result<InstanceRecord, SessionError>;

    /// Opens a live session for a paired device.
    async fn connect(
        &self,
        uuid: InstanceUuid,
        timeout: Option<Duration>,
    ) -> Result<InstanceRecord, SessionError>;

    /// Closes the live session, keeping the device paired.
    async fn disconnect(&self, uuid: InstanceUuid) -> Result<InstanceRecord, SessionError>;

    /// Unlinks the device and forgets its identity.
    async fn logout(&self, uuid: InstanceUuid) -> Result<InstanceRecord, SessionError>;

    /// Returns the current pairing payload.
    async fn qr_code(&self, uuid: InstanceUuid) -> Result<String, SessionError>;

    /// Probes liveness and returns the resulting status.
    async fn ping(&self, uuid: InstanceUuid) -> Result<InstanceStatus, SessionError>;

    /// Creates a new logged-out instance with a fresh token.
    async fn create_instance(&self, name: String) -> Result<InstanceRecord, SessionError>;

    /// Changes an instance's display name.
    async fn rename(&self, uuid: InstanceUuid, name: String)
    -> Result<InstanceRecord, SessionError>;

    /// Replaces an instance's token.
    async fn renew_token(&self, uuid: InstanceUuid) -> Result<InstanceRecord, SessionError>;

    /// Lifts a ban.
    async fn unban(&self, uuid: InstanceUuid) -> Result<InstanceRecord, SessionError>;

    /// Force-disconnects, evicts, and deletes an instance.
    async fn delete_instance(&self, uuid: InstanceUuid) -> Result<(), SessionError>;

    /// Counts cached instances.
    fn stats(&self) -> SessionStats;
}
