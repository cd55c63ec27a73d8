//! Connection client boundary.
//!
//! The gateway never speaks the messaging network's protocol itself. A
//! [`ConnectionClient`] opens device sessions on its behalf and reports what
//! happens to them as a stream of [`ClientEvent`]s.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    time::Duration,
};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::instances::records::InstanceRecord;

/// Identity the remote network assigns once pairing completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub jid: String,
    pub phone: String,
    pub lid: Option<String>,
    pub device: Option<String>,
}

/// Something that happened to an open session.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A new pairing payload; it replaces any previous one.
    QrCode { code: String, expires_in: Duration },

    /// The pairing payload was scanned and the device is now linked and online.
    Paired(DeviceIdentity),

    /// Pairing gave up (codes exhausted, rejected, or cancelled remotely).
    PairingFailed { reason: String },

    /// The live session dropped.
    Disconnected,

    /// The device was unlinked remotely.
    LoggedOut { reason: String },

    /// The account was restricted by the network.
    Banned {
        reason: String,
        expires_at: Option<Timestamp>,
    },
}

/// Errors raised by connection client implementations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote side answered with something unexpected.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The session was refused.
    #[error("session rejected: {0}")]
    Rejected(String),
}

/// One open session to the messaging network.
#[automock]
#[async_trait]
pub trait Connection: Send + Sync {
    /// Probes whether the session is still usable.
    async fn is_alive(&self) -> bool;

    /// Closes the session, keeping the device linked.
    async fn disconnect(&self) -> Result<(), ClientError>;

    /// Unlinks the device from the remote account and closes the session.
    async fn logout(&self) -> Result<(), ClientError>;
}

/// A freshly opened session and the events it will report.
pub struct Session {
    pub connection: Box<dyn Connection>,
    pub events: mpsc::Receiver<ClientEvent>,
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

/// Opens sessions to the messaging network.
#[automock]
#[async_trait]
pub trait ConnectionClient: Send + Sync {
    /// Starts pairing a device that has no identity yet. The returned session
    /// reports [`ClientEvent::QrCode`] payloads until it is paired or fails.
    async fn pair(&self, instance: &InstanceRecord) -> Result<Session, ClientError>;

    /// Opens a session for an already paired device.
    async fn connect(&self, instance: &InstanceRecord) -> Result<Session, ClientError>;

    /// Unlinks a paired device that has no open session.
    async fn logout(&self, instance: &InstanceRecord) -> Result<(), ClientError>;
}
