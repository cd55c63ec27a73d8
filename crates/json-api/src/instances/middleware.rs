//! Instance resolution middleware.
//!
//! Requests name their instance either with an `X-Instance-Id` header or with
//! the instance's own bearer token. The resolved [`InstanceContext`] is stored
//! in the depot for handlers further down the chain.

use std::sync::Arc;

use salvo::{http::header::AUTHORIZATION, prelude::*};
use uuid::Uuid;

use switchboard_app::{domain::instances::records::InstanceRecord, sessions::SessionError};

use crate::{
    extensions::*,
    instances::InstanceContext,
    sessions::errors::into_status_error,
    state::State,
};

pub(crate) const INSTANCE_ID_HEADER: &str = "x-instance-id";

#[derive(Debug)]
enum Identifier<'a> {
    Uuid(Uuid),
    Token(&'a str),
}

/// Resolves the request's instance and injects its [`InstanceContext`].
#[salvo::handler]
pub(crate) async fn resolve(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    match resolve_instance(req, depot).await {
        Ok(context) => {
            // Lands on the enclosing `http.request` span.
            tracing::Span::current()
                .record("instance_uuid", tracing::field::display(context.uuid));

            depot.insert_instance(context);

            ctrl.call_next(req, depot, res).await;
        }
        Err(error) => {
            res.render(error);
            ctrl.skip_rest();
        }
    }
}

/// Ensures the resolved instance has a live session, connecting it on demand.
#[salvo::handler]
pub(crate) async fn require_connection(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    match ensure_connected(depot).await {
        Ok(instance) => {
            depot.insert_instance(instance.into());

            ctrl.call_next(req, depot, res).await;
        }
        Err(error) => {
            res.render(error);
            ctrl.skip_rest();
        }
    }
}

async fn resolve_instance(req: &Request, depot: &Depot) -> Result<InstanceContext, ApiError> {
    let identifier = identify(req)?;
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let instance = match identifier {
        Identifier::Uuid(uuid) => state.sessions.resolve(uuid.into()).await,
        Identifier::Token(token) => state.sessions.resolve_by_token(token).await,
    }
    .map_err(into_status_error)?;

    Ok(instance.into())
}

async fn ensure_connected(depot: &Depot) -> Result<InstanceRecord, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let context = depot.instance_or_500()?;

    match state.sessions.connect(context.uuid, None).await {
        Ok(instance) => Ok(instance),
        Err(SessionError::AlreadyConnected) => Ok(context.instance.clone()),
        Err(error) => Err(into_status_error(error)),
    }
}

fn identify(req: &Request) -> Result<Identifier<'_>, ApiError> {
    if let Some(value) = req.headers().get(INSTANCE_ID_HEADER) {
        return value
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(Identifier::Uuid)
            .ok_or_else(|| ApiError::bad_request("invalid X-Instance-Id header"));
    }

    extract_bearer_token(req)
        .map(Identifier::Token)
        .ok_or_else(|| ApiError::bad_request("missing instance identifier"))
}

pub(crate) fn extract_bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.splitn(2, ' ');

    let scheme = parts.next()?;
    let token = parts.next()?.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}
