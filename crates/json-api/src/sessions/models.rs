//! Session Models

use std::string::ToString;

use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use switchboard_app::domain::instances::records::{InstanceRecord, InstanceStatus};

/// Instance view returned by session and admin routes.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct InstanceResponse {
    /// The unique identifier of the instance
    pub uuid: Uuid,

    /// Display name
    pub name: String,

    /// Lifecycle status
    pub status: String,

    /// Phone number of the paired account
    pub phone: Option<String>,

    /// Network address of the paired device
    pub jid: Option<String>,

    /// Device label reported during pairing
    pub device: Option<String>,

    /// Explanation attached to the current status
    pub reason: Option<String>,

    /// When the instance last opened a session
    pub last_connected_at: Option<String>,

    /// When the instance last completed pairing
    pub last_login_at: Option<String>,

    /// When a ban on the instance lapses
    pub ban_expires_at: Option<String>,

    /// The date and time the instance was created
    pub created_at: String,

    /// The date and time the instance was last updated
    pub updated_at: String,
}

impl From<InstanceRecord> for InstanceResponse {
    fn from(instance: InstanceRecord) -> Self {
        InstanceResponse {
            uuid: instance.uuid.into(),
            name: instance.name,
            status: instance.status.as_str().to_string(),
            phone: instance.phone,
            jid: instance.jid,
            device: instance.device,
            reason: instance.reason,
            last_connected_at: instance.last_connected_at.as_ref().map(ToString::to_string),
            last_login_at: instance.last_login_at.as_ref().map(ToString::to_string),
            ban_expires_at: instance.ban_expires_at.as_ref().map(ToString::to_string),
            created_at: instance.created_at.to_string(),
            updated_at: instance.updated_at.to_string(),
        }
    }
}

/// Ping response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct PingResponse {
    /// Lifecycle status after the probe
    pub status: String,
}

impl From<InstanceStatus> for PingResponse {
    fn from(status: InstanceStatus) -> Self {
        PingResponse {
            status: status.as_str().to_string(),
        }
    }
}

/// QR code response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct QrResponse {
    /// Pairing payload to render as a QR code
    pub qr_code: String,
}
