//! Instance Records

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::uuids::TypedUuid;

/// Instance UUID
pub type InstanceUuid = TypedUuid<InstanceRecord>;

/// Connection lifecycle status of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// No paired device; the instance must pair before it can connect.
    LoggedOut,

    /// A pairing flow is running and QR payloads are being produced.
    Pairing,

    /// A connection attempt is in flight.
    Connecting,

    /// A live session to the messaging network is open.
    Connected,

    /// Paired, but no live session.
    Disconnected,

    /// Operator- or network-imposed restriction, possibly time-bounded.
    Banned,
}

impl InstanceStatus {
    /// Storage and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoggedOut => "logged_out",
            Self::Pairing => "pairing",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Banned => "banned",
        }
    }

    /// Every status, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::LoggedOut,
        Self::Pairing,
        Self::Connecting,
        Self::Connected,
        Self::Disconnected,
        Self::Banned,
    ];
}

impl Display for InstanceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored status string is not a known [`InstanceStatus`].
#[derive(Debug, Error)]
#[error("unknown instance status: {0}")]
pub struct UnknownInstanceStatus(pub String);

impl FromStr for InstanceStatus {
    type Err = UnknownInstanceStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownInstanceStatus(value.to_string()))
    }
}

/// Instance Record
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    /// Stable tenant identifier.
    pub uuid: InstanceUuid,

    /// Display label.
    pub name: String,

    /// Opaque credential that resolves requests to this instance.
    pub token: String,

    /// Phone number of the paired account.
    pub phone: Option<String>,

    /// Network address of the paired device.
    pub jid: Option<String>,

    /// Linked-identity address of the paired device.
    pub lid: Option<String>,

    /// Device label reported during pairing.
    pub device: Option<String>,

    /// Current lifecycle status.
    pub status: InstanceStatus,

    /// Pairing payload, only present while pairing.
    pub qr_code: Option<String>,

    /// When the current pairing payload rotates.
    pub qr_expires_at: Option<Timestamp>,

    /// Explanation attached to error or terminal states.
    pub reason: Option<String>,

    pub last_connected_at: Option<Timestamp>,
    pub last_login_at: Option<Timestamp>,
    pub banned_at: Option<Timestamp>,
    pub ban_expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl InstanceRecord {
    /// Whether the instance has completed at least one pairing and still holds
    /// its device identity.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.jid.is_some()
    }

    /// Whether the instance is banned with an expiry that has already passed.
    #[must_use]
    pub fn ban_expired(&self, now: Timestamp) -> bool {
        self.status == InstanceStatus::Banned
            && self.ban_expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// The pairing payload, unless it has rotated out.
    #[must_use]
    pub fn current_qr_code(&self, now: Timestamp) -> Option<&str> {
        if self.status != InstanceStatus::Pairing {
            return None;
        }

        self.qr_code
            .as_deref()
            .filter(|_| self.qr_expires_at.is_none_or(|expires_at| expires_at > now))
    }

    /// Status an instance settles in once nothing is holding it open.
    #[must_use]
    pub fn idle_status(&self) -> InstanceStatus {
        if self.is_logged_in() {
            InstanceStatus::Disconnected
        } else {
            InstanceStatus::LoggedOut
        }
    }

    /// Drops the device identity and any pairing payload.
    pub fn clear_identity(&mut self) {
        self.phone = None;
        self.jid = None;
        self.lid = None;
        self.device = None;
        self.clear_qr_code();
    }

    pub fn clear_qr_code(&mut self) {
        self.qr_code = None;
        self.qr_expires_at = None;
    }

    pub fn clear_ban(&mut self) {
        self.banned_at = None;
        self.ban_expires_at = None;
    }

    /// Normalises a record loaded from storage: this process holds no live
    /// connection for it yet, so transient states cannot survive the load.
    #[must_use]
    pub fn rehydrated(mut self) -> Self {
        match self.status {
            InstanceStatus::Connected | InstanceStatus::Connecting => {
                self.status = InstanceStatus::Disconnected;
            }
            InstanceStatus::Pairing => {
                self.clear_qr_code();
                self.status = self.idle_status();
            }
            InstanceStatus::LoggedOut
            | InstanceStatus::Disconnected
            | InstanceStatus::Banned => {}
        }

        self
    }
}
