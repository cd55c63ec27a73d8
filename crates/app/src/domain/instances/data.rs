//! Instance Data

use crate::domain::instances::records::{InstanceStatus, InstanceUuid};

/// Longest accepted display name, in characters.
pub const MAX_INSTANCE_NAME_CHARS: usize = 100;

/// New Instance Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewInstance {
    /// UUID to assign to the instance row.
    pub uuid: InstanceUuid,

    /// Display name to persist.
    pub name: String,

    /// Credential to persist.
    pub token: String,
}

/// Lookup criteria for the instances repository.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceFilter {
    /// Match a single instance by identifier.
    Uuid(InstanceUuid),

    /// Match a single instance by its credential.
    Token(String),

    /// Match every instance persisted with the given status.
    Status(InstanceStatus),
}

/// Trims a display name and checks it is non-empty and bounded.
///
/// Returns `None` when the name is unusable.
#[must_use]
pub fn normalize_instance_name(name: &str) -> Option<String> {
    let name = name.trim();

    if name.is_empty() || name.chars().count() > MAX_INSTANCE_NAME_CHARS {
        return None;
    }

    Some(name.to_string())
}
