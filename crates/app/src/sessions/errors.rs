//! Session errors.

use jiff::Timestamp;
use thiserror::Error;

use crate::{
    domain::instances::{InstancesRepositoryError, records::InstanceUuid},
    sessions::{client::ClientError, registry::RegistryError},
};

/// Coarse error taxonomy that boundary layers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// Instance or record absent.
    NotFound,

    /// Operation not permitted from the current status.
    InvalidState,

    /// Operator- or network-imposed restriction.
    Banned,

    /// Missing or invalid credential.
    Unauthorized,

    /// Underlying connection or storage failure.
    Internal,

    /// Bounded wait exceeded.
    Timeout,
}

/// Session orchestration error variants.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("instance not found")]
    NotFound,

    #[error("instance token not recognised")]
    UnknownToken,

    #[error("instance is already logged in")]
    AlreadyLoggedIn,

    #[error("instance is already pairing")]
    IsPairing,

    #[error("instance has never been paired")]
    NotLoggedIn,

    #[error("instance is banned")]
    Banned {
        reason: Option<String>,
        expires_at: Option<Timestamp>,
    },

    #[error("instance is not banned")]
    NotBanned,

    #[error("instance is already connected")]
    AlreadyConnected,

    #[error("instance is already connecting")]
    IsConnecting,

    #[error("instance is already disconnected")]
    AlreadyDisconnected,

    #[error("instance is already logged out")]
    AlreadyLoggedOut,

    #[error("instance is not pairing")]
    NotPairing,

    #[error("instance pairing already completed")]
    AlreadyPaired,

    #[error("no QR code has been generated yet")]
    NoQrCode,

    #[error("instance is in the middle of a transition")]
    Busy,

    #[error("instance name must be 1-100 characters")]
    InvalidName,

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("{operation} failed for instance {instance}")]
    Client {
        operation: &'static str,
        instance: InstanceUuid,
        #[source]
        source: ClientError,
    },

    #[error("instance lookup failed")]
    Lookup(#[source] InstancesRepositoryError),

    #[error("failed to persist {operation} for instance {instance}")]
    Storage {
        operation: &'static str,
        instance: InstanceUuid,
        #[source]
        source: InstancesRepositoryError,
    },
}

impl SessionError {
    /// Stable, machine-readable reason code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::UnknownToken => "unknown_token",
            Self::AlreadyLoggedIn => "already_logged_in",
            Self::IsPairing => "is_pairing",
            Self::NotLoggedIn => "not_logged_in",
            Self::Banned { .. } => "banned",
            Self::NotBanned => "not_banned",
            Self::AlreadyConnected => "already_connected",
            Self::IsConnecting => "is_connecting",
            Self::AlreadyDisconnected => "already_disconnected",
            Self::AlreadyLoggedOut => "already_logged_out",
            Self::NotPairing => "not_pairing",
            Self::AlreadyPaired => "already_paired",
            Self::NoQrCode => "no_qr_code",
            Self::Busy => "busy",
            Self::InvalidName => "invalid_name",
            Self::Timeout { .. } => "timeout",
            Self::Client { .. } | Self::Lookup(_) | Self::Storage { .. } => "internal",
        }
    }

    #[must_use]
    pub const fn kind(&self) -> SessionErrorKind {
        match self {
            Self::NotFound => SessionErrorKind::NotFound,
            Self::UnknownToken => SessionErrorKind::Unauthorized,
            Self::Banned { .. } => SessionErrorKind::Banned,
            Self::Timeout { .. } => SessionErrorKind::Timeout,
            Self::Client { .. } | Self::Lookup(_) | Self::Storage { .. } => {
                SessionErrorKind::Internal
            }
            Self::AlreadyLoggedIn
            | Self::IsPairing
            | Self::NotLoggedIn
            | Self::NotBanned
            | Self::AlreadyConnected
            | Self::IsConnecting
            | Self::AlreadyDisconnected
            | Self::AlreadyLoggedOut
            | Self::NotPairing
            | Self::AlreadyPaired
            | Self::NoQrCode
            | Self::Busy
            | Self::InvalidName => SessionErrorKind::InvalidState,
        }
    }

    pub(crate) fn storage(
        operation: &'static str,
        instance: InstanceUuid,
        source: InstancesRepositoryError,
    ) -> Self {
        Self::Storage {
            operation,
            instance,
            source,
        }
    }

    /// Maps a repository lookup failure, keeping absence distinct from storage errors.
    pub(crate) fn lookup(
        operation: &'static str,
        instance: InstanceUuid,
        source: InstancesRepositoryError,
    ) -> Self {
        match source {
            InstancesRepositoryError::NotFound => Self::NotFound,
            source => Self::storage(operation, instance, source),
        }
    }
}

impl From<RegistryError> for SessionError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Busy(_) => Self::Busy,
        }
    }
}
