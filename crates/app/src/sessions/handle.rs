//! Shared instance handle.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use jiff::Timestamp;
use tokio::{
    sync::{Mutex, MutexGuard, TryLockError, mpsc, watch},
    task::JoinHandle,
};

use crate::{
    domain::instances::records::{InstanceRecord, InstanceStatus, InstanceUuid},
    sessions::client::{ClientEvent, Connection, Session},
};

/// The registry's entry for one instance.
///
/// Every caller that resolves the same instance shares one handle, so they all
/// observe the same in-flight state. The snapshot is published through a
/// `watch` channel; the orchestration lock guards the live connection and is
/// held for the whole of every transition.
pub struct InstanceHandle {
    uuid: InstanceUuid,
    state: watch::Sender<InstanceRecord>,
    slot: Mutex<SessionSlot>,
}

impl InstanceHandle {
    pub(crate) fn new(instance: InstanceRecord) -> Self {
        let (state, _receiver) = watch::channel(instance.clone());

        Self {
            uuid: instance.uuid,
            state,
            slot: Mutex::new(SessionSlot::default()),
        }
    }

    #[must_use]
    pub fn uuid(&self) -> InstanceUuid {
        self.uuid
    }

    /// A copy of the current instance state.
    #[must_use]
    pub fn snapshot(&self) -> InstanceRecord {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> InstanceStatus {
        self.state.borrow().status
    }

    /// Whether a transition currently holds the orchestration lock.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<InstanceRecord> {
        self.state.subscribe()
    }

    /// Applies a mutation and notifies watchers. Only the orchestrator and the
    /// registry call this.
    pub(crate) fn publish(&self, mutate: impl FnOnce(&mut InstanceRecord)) -> InstanceRecord {
        self.state.send_modify(|instance| {
            mutate(instance);
            instance.updated_at = Timestamp::now();
        });

        self.snapshot()
    }

    pub(crate) fn replace(&self, instance: InstanceRecord) {
        self.state.send_replace(instance);
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().await
    }

    pub(crate) fn try_lock(&self) -> Result<MutexGuard<'_, SessionSlot>, TryLockError> {
        self.slot.try_lock()
    }
}

impl Debug for InstanceHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InstanceHandle")
            .field("uuid", &self.uuid)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// The live connection owned by an instance, if any.
///
/// `generation` increases with every installed session so that events from a
/// superseded session can be told apart and dropped. A retired slot belongs to
/// a deleted instance and refuses every further transition.
#[derive(Default)]
pub(crate) struct SessionSlot {
    connection: Option<Box<dyn Connection>>,
    generation: u64,
    drain: Option<JoinHandle<()>>,
    retired: bool,
}

impl SessionSlot {
    pub(crate) fn connection(&self) -> Option<&dyn Connection> {
        self.connection.as_deref()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired
    }

    /// Marks the slot as belonging to a deleted instance. Callers still queued
    /// on the lock observe the flag once they acquire it.
    pub(crate) fn retire(&mut self) {
        self.retired = true;

        if let Some(drain) = self.drain.take() {
            drain.abort();
        }

        self.generation += 1;
        self.connection = None;
    }

    /// Stores a new session and starts its event drain, replacing any previous
    /// session. Returns the generation the drain must present.
    pub(crate) fn install(
        &mut self,
        session: Session,
        spawn_drain: impl FnOnce(u64, mpsc::Receiver<ClientEvent>) -> JoinHandle<()>,
    ) -> u64 {
        self.close();

        self.generation += 1;
        self.connection = Some(session.connection);
        self.drain = Some(spawn_drain(self.generation, session.events));

        self.generation
    }

    /// Takes the connection out and stops its event drain. Used by transitions
    /// that callers trigger.
    pub(crate) fn close(&mut self) -> Option<Box<dyn Connection>> {
        if let Some(drain) = self.drain.take() {
            drain.abort();
        }

        self.generation += 1;
        self.connection.take()
    }

    /// Takes the connection out from inside its own event drain, which must not
    /// abort itself.
    pub(crate) fn release(&mut self) -> Option<Box<dyn Connection>> {
        self.drain = None;
        self.generation += 1;
        self.connection.take()
    }
}
