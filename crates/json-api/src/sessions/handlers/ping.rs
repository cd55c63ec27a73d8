//! Ping Session Handler

use std::sync::Arc;

use salvo::prelude::*;

use crate::{
    extensions::*,
    sessions::{errors::into_status_error, models::PingResponse},
    state::State,
};

/// Ping Session Handler
///
/// Probes the live connection and reports the resulting status. A dead
/// connection is moved to its idle status before answering.
#[endpoint(
    tags("session"),
    summary = "Ping Session",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Current status"),
        (status_code = StatusCode::NOT_FOUND, description = "Instance not found"),
    ),
)]
#[tracing::instrument(
    name = "sessions.http.ping",
    skip(depot),
    fields(instance_uuid = tracing::field::Empty),
    err
)]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<PingResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let instance = depot.instance_or_500()?;

    tracing::Span::current().record("instance_uuid", tracing::field::display(instance.uuid));

    let status = state
        .sessions
        .ping(instance.uuid)
        .await
        .map_err(into_status_error)?;

    Ok(Json(status.into()))
}
