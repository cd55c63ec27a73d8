//! Logout Handler

use std::sync::Arc;

use salvo::prelude::*;

use crate::{
    extensions::*,
    sessions::{errors::into_status_error, models::InstanceResponse},
    state::State,
};

/// Logout Handler
///
/// Unlinks the paired device and forgets its identity.
#[endpoint(
    tags("session"),
    summary = "Logout",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Logged out"),
        (status_code = StatusCode::CONFLICT, description = "Already logged out"),
        (status_code = StatusCode::LOCKED, description = "Instance is banned"),
    ),
)]
#[tracing::instrument(
    name = "sessions.http.logout",
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
        .logout(instance.uuid)
        .await
        .map_err(into_status_error)?;

    tracing::info!(instance_uuid = %instance.uuid, "instance logged out");

    Ok(Json(instance.into()))
}
