//! Test helpers.

use std::sync::Arc;

use clap::Parser as _;
use jiff::Timestamp;
use salvo::{affix_state::inject, prelude::*};
use uuid::Uuid;

use switchboard_app::{
    domain::instances::records::{InstanceRecord, InstanceStatus, InstanceUuid},
    sessions::MockSessionService,
};

use crate::{config::ServerConfig, extensions::*, instances::InstanceContext, state::State};

pub(crate) const TEST_INSTANCE_UUID: InstanceUuid = InstanceUuid::from_uuid(Uuid::nil());

pub(crate) const TEST_ADMIN_TOKEN: &str = "admin-secret";

/// Parses the server config from the required flags plus `extra`.
pub(crate) fn parse_config<'a>(
    extra: impl IntoIterator<Item = &'a str>,
) -> Result<ServerConfig, clap::Error> {
    let required = [
        "switchboard-json",
        "--database-url",
        "postgres://localhost/switchboard",
        "--admin-token",
        TEST_ADMIN_TOKEN,
    ];

    ServerConfig::try_parse_from(required.into_iter().chain(extra))
}

pub(crate) fn make_instance(status: InstanceStatus) -> InstanceRecord {
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
        created_at: Timestamp::UNIX_EPOCH,
        updated_at: Timestamp::UNIX_EPOCH,
    }
}

#[salvo::handler]
pub(crate) async fn inject_instance(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    depot.insert_instance(InstanceContext::from(InstanceRecord {
        uuid: TEST_INSTANCE_UUID,
        ..make_instance(InstanceStatus::Connected)
    }));

    ctrl.call_next(req, depot, res).await;
}

pub(crate) fn state_with_sessions(sessions: MockSessionService) -> Arc<State> {
    Arc::new(State::new(
        Arc::new(sessions),
        TEST_ADMIN_TOKEN.to_string(),
    ))
}

pub(crate) fn sessions_service(sessions: MockSessionService, route: Router) -> Service {
    Service::new(
        Router::new()
            .hoop(inject(state_with_sessions(sessions)))
            .hoop(inject_instance)
            .push(route),
    )
}
