//! Test Helpers

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use jiff::Timestamp;
use testresult::TestResult;
use tokio::{
    sync::{Mutex, mpsc},
    time,
};

use crate::{
    domain::instances::{
        MockInstancesRepository,
        records::{InstanceRecord, InstanceStatus, InstanceUuid},
    },
    sessions::client::{ClientError, ClientEvent, Connection, ConnectionClient, Session},
};

pub(crate) fn make_instance(status: InstanceStatus) -> InstanceRecord {
    let now = Timestamp::now();

    InstanceRecord {
        uuid: InstanceUuid::new(),
        name: "Support Line".to_string(),
        token: "sb_test_token".to_string(),
        phone: None,
        jid: None,
        lid: None,
        device: None,
        status,
        qr_code: None,
        qr_expires_at: None,
        reason: None,
        last_connected_at: None,
        last_login_at: None,
        banned_at: None,
        ban_expires_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn make_paired_instance(status: InstanceStatus) -> InstanceRecord {
    let now = Timestamp::now();

    InstanceRecord {
        phone: Some("5511999990000".to_string()),
        jid: Some("5511999990000@s.whatsapp.net".to_string()),
        device: Some("gateway".to_string()),
        last_login_at: Some(now),
        ..make_instance(status)
    }
}

/// Repository mock that accepts every save.
pub(crate) fn saving_repository() -> MockInstancesRepository {
    let mut repository = MockInstancesRepository::new();

    repository.expect_save().returning(|_| Ok(()));

    repository
}

/// Scripted [`ConnectionClient`] that counts calls and hands tests the
/// sending half of every session it opens.
#[derive(Debug, Default)]
pub(crate) struct FakeClient {
    connects: AtomicUsize,
    pairs: AtomicUsize,
    unlinks: AtomicUsize,
    probes: Arc<AtomicUsize>,
    delay: Duration,
    failing: bool,
    alive: Arc<AtomicBool>,
    logout_fails: bool,
    senders: Mutex<Vec<mpsc::Sender<ClientEvent>>>,
}

impl FakeClient {
    pub(crate) fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
            ..Self::default()
        }
    }

    /// Every call takes `delay` before answering.
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    /// Every call is refused.
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    /// Unlinking fails, with or without a session.
    pub(crate) fn with_failing_logout() -> Self {
        Self {
            logout_fails: true,
            ..Self::new()
        }
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn pairs(&self) -> usize {
        self.pairs.load(Ordering::SeqCst)
    }

    /// Device-level unlinks, made without an open session.
    pub(crate) fn unlinks(&self) -> usize {
        self.unlinks.load(Ordering::SeqCst)
    }

    /// Liveness probes across every session this client opened.
    pub(crate) fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Sender for the most recently opened session.
    pub(crate) async fn events(&self) -> TestResult<mpsc::Sender<ClientEvent>> {
        let sender = self
            .senders
            .lock()
            .await
            .last()
            .cloned()
            .ok_or("no session has been opened")?;

        Ok(sender)
    }

    /// Drops every session's sending half, ending their event streams.
    pub(crate) async fn hang_up(&self) {
        self.senders.lock().await.clear();
    }

    async fn open(&self) -> Result<Session, ClientError> {
        if !self.delay.is_zero() {
            time::sleep(self.delay).await;
        }

        if self.failing {
            return Err(ClientError::Rejected("refused".to_string()));
        }

        let (sender, events) = mpsc::channel(16);

        self.senders.lock().await.push(sender);

        Ok(Session {
            connection: Box::new(FakeConnection {
                alive: Arc::clone(&self.alive),
                probes: Arc::clone(&self.probes),
                logout_fails: self.logout_fails,
            }),
            events,
        })
    }
}

#[async_trait]
impl ConnectionClient for FakeClient {
    async fn pair(&self, _instance: &InstanceRecord) -> Result<Session, ClientError> {
        self.pairs.fetch_add(1, Ordering::SeqCst);

        self.open().await
    }

    async fn connect(&self, _instance: &InstanceRecord) -> Result<Session, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        self.open().await
    }

    async fn logout(&self, _instance: &InstanceRecord) -> Result<(), ClientError> {
        self.unlinks.fetch_add(1, Ordering::SeqCst);

        if self.logout_fails {
            return Err(ClientError::UnexpectedResponse("unlink failed".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug)]
struct FakeConnection {
    alive: Arc<AtomicBool>,
    probes: Arc<AtomicUsize>,
    logout_fails: bool,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn is_alive(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);

        self.alive.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn logout(&self) -> Result<(), ClientError> {
        if self.logout_fails {
            return Err(ClientError::UnexpectedResponse("unlink failed".to_string()));
        }

        Ok(())
    }
}
