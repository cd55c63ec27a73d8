//! Transition guards.
//!
//! Every status-dependent decision of the state machine lives here so that
//! callers only ever see the closed [`SessionError`] taxonomy.

use jiff::Timestamp;

use crate::{
    domain::instances::records::{InstanceRecord, InstanceStatus},
    sessions::errors::SessionError,
};

fn banned(instance: &InstanceRecord) -> SessionError {
    SessionError::Banned {
        reason: instance.reason.clone(),
        expires_at: instance.ban_expires_at,
    }
}

pub(crate) fn check_pair(instance: &InstanceRecord) -> Result<(), SessionError> {
    match instance.status {
        InstanceStatus::Banned => Err(banned(instance)),
        InstanceStatus::Pairing => Err(SessionError::IsPairing),
        InstanceStatus::Connecting => Err(SessionError::IsConnecting),
        InstanceStatus::Connected => Err(SessionError::AlreadyLoggedIn),
        InstanceStatus::LoggedOut | InstanceStatus::Disconnected if instance.is_logged_in() => {
            Err(SessionError::AlreadyLoggedIn)
        }
        InstanceStatus::LoggedOut | InstanceStatus::Disconnected => Ok(()),
    }
}

pub(crate) fn check_connect(instance: &InstanceRecord) -> Result<(), SessionError> {
    match instance.status {
        InstanceStatus::Banned => Err(banned(instance)),
        _ if !instance.is_logged_in() => Err(SessionError::NotLoggedIn),
        InstanceStatus::Connected => Err(SessionError::AlreadyConnected),
        InstanceStatus::Connecting => Err(SessionError::IsConnecting),
        InstanceStatus::Pairing => Err(SessionError::IsPairing),
        InstanceStatus::LoggedOut | InstanceStatus::Disconnected => Ok(()),
    }
}

pub(crate) fn check_disconnect(instance: &InstanceRecord) -> Result<(), SessionError> {
    match instance.status {
        InstanceStatus::Connected => Ok(()),
        _ => Err(SessionError::AlreadyDisconnected),
    }
}

pub(crate) fn check_logout(instance: &InstanceRecord) -> Result<(), SessionError> {
    match instance.status {
        InstanceStatus::LoggedOut => Err(SessionError::AlreadyLoggedOut),
        InstanceStatus::Banned => Err(banned(instance)),
        InstanceStatus::Pairing
        | InstanceStatus::Connecting
        | InstanceStatus::Connected
        | InstanceStatus::Disconnected => Ok(()),
    }
}

pub(crate) fn check_unban(instance: &InstanceRecord) -> Result<(), SessionError> {
    match instance.status {
        InstanceStatus::Banned => Ok(()),
        _ => Err(SessionError::NotBanned),
    }
}

/// Whether a QR poller can stop waiting on `instance`.
pub(crate) fn qr_settled(instance: &InstanceRecord, now: Timestamp) -> bool {
    instance.status != InstanceStatus::Pairing || instance.current_qr_code(now).is_some()
}

/// The answer a QR poll gives for `instance`.
pub(crate) fn qr_outcome(instance: &InstanceRecord, now: Timestamp) -> Result<String, SessionError> {
    match instance.status {
        InstanceStatus::Pairing => instance
            .current_qr_code(now)
            .map(ToString::to_string)
            .ok_or(SessionError::NoQrCode),
        InstanceStatus::Banned => Err(banned(instance)),
        _ if instance.is_logged_in() => Err(SessionError::AlreadyPaired),
        _ => Err(SessionError::NotPairing),
    }
}
