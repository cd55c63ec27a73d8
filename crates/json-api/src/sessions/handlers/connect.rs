//! Connect Handler

use std::sync::Arc;

use salvo::{oapi::extract::QueryParam, prelude::*};

use crate::{
    extensions::*,
    sessions::{errors::into_status_error, handlers::timeout_param, models::InstanceResponse},
    state::State,
};

/// Connect Handler
///
/// Opens a live session for a paired device.
#[endpoint(
    tags("session"),
    summary = "Connect",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Connected"),
        (status_code = StatusCode::ACCEPTED, description = "Connection already in progress"),
        (status_code = StatusCode::ALREADY_REPORTED, description = "Already connected"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Device has never been paired"),
        (status_code = StatusCode::LOCKED, description = "Instance is banned"),
        (status_code = StatusCode::GATEWAY_TIMEOUT, description = "Connection did not open in time"),
    ),
)]
#[tracing::instrument(
    name = "sessions.http.connect",
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
        .connect(instance.uuid, timeout_param(timeout))
        .await
        .map_err(into_status_error)?;

    Ok(Json(instance.into()))
}
