//! Disconnect Handler

use std::sync::Arc;

use salvo::prelude::*;

use crate::{
    extensions::*,
    sessions::{errors::into_status_error, models::InstanceResponse},
    state::State,
};

/// Disconnect Handler
///
/// Closes the live session. The device stays paired.
#[endpoint(
    tags("session"),
    summary = "Disconnect",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Disconnected"),
        (status_code = StatusCode::CONFLICT, description = "Already disconnected"),
    ),
)]
#[tracing::instrument(
    name = "sessions.http.disconnect",
    skip(depot),
    fields(instance_uuid = tracing::field::Empty),
    err
)]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<InstanceResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let instance = depot.instance_or_500()?;

    tracing::Span::current().record("instance_uuid", tracing::field::display(instance.uuid));

    let instance = state
        .sessions
        .disconnect(instance.uuid)
        .await
        .map_err(into_status_error)?;

    Ok(Json(instance.into()))
}
