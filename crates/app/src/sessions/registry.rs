//! Instance Registry

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use tracing::debug;

use crate::{
    domain::instances::records::{InstanceRecord, InstanceUuid},
    sessions::handle::InstanceHandle,
};

/// Registry error variants.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The cached entry is mid-transition and cannot be replaced.
    #[error("instance {0} is in the middle of a transition")]
    Busy(InstanceUuid),
}

/// Process-wide cache of live instance handles.
///
/// Holds no durable state: it starts empty and is filled lazily from the
/// repository. No operation awaits, so the map is never held across I/O.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    entries: DashMap<InstanceUuid, Arc<InstanceHandle>>,
}

impl InstanceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached handle, if any. Never consults the repository.
    #[must_use]
    pub fn get(&self, uuid: InstanceUuid) -> Option<Arc<InstanceHandle>> {
        self.entries.get(&uuid).map(|entry| Arc::clone(entry.value()))
    }

    /// Caches `instance`.
    ///
    /// An existing idle entry keeps its handle and takes the new state (last
    /// writer wins), so `get` never hands out two handles for one ID.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Busy`] when the existing entry is mid-transition.
    pub fn add(&self, instance: InstanceRecord) -> Result<Arc<InstanceHandle>, RegistryError> {
        match self.entries.entry(instance.uuid) {
            Entry::Occupied(entry) => {
                let handle = entry.get();

                if handle.is_busy() {
                    return Err(RegistryError::Busy(instance.uuid));
                }

                handle.replace(instance);

                Ok(Arc::clone(handle))
            }
            Entry::Vacant(entry) => {
                let handle = Arc::new(InstanceHandle::new(instance));

                entry.insert(Arc::clone(&handle));

                Ok(handle)
            }
        }
    }

    /// Returns the cached handle, caching `instance` only when nothing is cached
    /// yet. In-memory state always wins over a freshly loaded record.
    pub fn get_or_add(&self, instance: InstanceRecord) -> Arc<InstanceHandle> {
        let uuid = instance.uuid;

        let handle = Arc::clone(
            self.entries
                .entry(uuid)
                .or_insert_with(|| Arc::new(InstanceHandle::new(instance)))
                .value(),
        );

        debug!(instance_uuid = %uuid, "instance cached");

        handle
    }

    /// Evicts the cached handle.
    pub fn remove(&self, uuid: InstanceUuid) -> Option<Arc<InstanceHandle>> {
        self.entries.remove(&uuid).map(|(_uuid, handle)| handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies out every cached handle.
    #[must_use]
    pub fn handles(&self) -> Vec<Arc<InstanceHandle>> {
        self.entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}
