//! Admin Models

use std::string::ToString;

use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use switchboard_app::domain::instances::records::InstanceRecord;

/// Instance name payload, used by create and rename.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct InstanceNameRequest {
    /// Display name, 1-100 characters
    pub name: String,
}

/// Instance view including its credential.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct InstanceCredentialsResponse {
    /// The unique identifier of the instance
    pub uuid: Uuid,

    /// Display name
    pub name: String,

    /// Bearer token for the instance's session routes
    pub token: String,

    /// Lifecycle status
    pub status: String,

    /// The date and time the instance was created
    pub created_at: String,

    /// The date and time the instance was last updated
    pub updated_at: String,

    /// When the instance last completed pairing
    pub last_login_at: Option<String>,
}

impl From<InstanceRecord> for InstanceCredentialsResponse {
    fn from(instance: InstanceRecord) -> Self {
        InstanceCredentialsResponse {
            uuid: instance.uuid.into(),
            name: instance.name,
            token: instance.token,
            status: instance.status.as_str().to_string(),
            created_at: instance.created_at.to_string(),
            updated_at: instance.updated_at.to_string(),
            last_login_at: instance.last_login_at.as_ref().map(ToString::to_string),
        }
    }
}
