//! Login Handler

use std::sync::Arc;

use salvo::{oapi::extract::QueryParam, prelude::*};

use crate::{
    extensions::*,
    sessions::{errors::into_status_error, handlers::timeout_param, models::InstanceResponse},
    state::State,
};

/// Login Handler
///
/// Starts pairing a device. Poll `GET /session/qr` for the payload to scan.
#[endpoint(
    tags("session"),
    summary = "Start Pairing",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Pairing started"),
        (status_code = StatusCode::CONFLICT, description = "Already logged in"),
        (status_code = StatusCode::BAD_REQUEST, description = "Already pairing"),
        (status_code = StatusCode::LOCKED, description = "Instance is banned"),
        (status_code = StatusCode::GATEWAY_TIMEOUT, description = "Pairing did not start in time"),
    ),
)]
#[tracing::instrument(
    name = "sessions.http.login",
    skip(timeout, depot),
    fields(instance_uuid = tracing::field::Empty),
    err
)]
pub(crate) async fn handler(
    timeout: QueryParam<u64, false>,
    depot: &mut Depot,
) -> Result<Json<InstanceResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let instance = depot.instance_or_500()?;

    tracing::Span::current().record("instance_uuid", tracing::field::display(instance.uuid));

    let instance = state
        .sessions
        .pair(instance.uuid, timeout_param(timeout))
        .await
        .map_err(into_status_error)?;

    Ok(Json(instance.into()))
}
