//! Instance Context

use switchboard_app::domain::instances::records::{InstanceRecord, InstanceUuid};

/// The instance a request has been resolved to.
#[derive(Debug, Clone)]
pub(crate) struct InstanceContext {
    pub(crate) uuid: InstanceUuid,

    /// Snapshot taken when the request was resolved.
    pub(crate) instance: InstanceRecord,
}

impl From<InstanceRecord> for InstanceContext {
    fn from(instance: InstanceRecord) -> Self {
        Self {
            uuid: instance.uuid,
            instance,
        }
    }
}
