//! Delete Instance Handler

use std::sync::Arc;

use salvo::{oapi::extract::PathParam, prelude::*};
use uuid::Uuid;

use crate::{extensions::*, sessions::errors::into_status_error, state::State};

/// Delete Instance Handler
///
/// Closes any live session, evicts the instance from memory and deletes it.
#[endpoint(
    tags("admin"),
    summary = "Delete Instance",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Instance deleted"),
        (status_code = StatusCode::NOT_FOUND, description = "Instance not found"),
        (status_code = StatusCode::CONFLICT, description = "Instance is mid-transition"),
    ),
)]
#[tracing::instrument(
    name = "admin.instances.delete",
    skip(instance, depot),
    fields(instance_uuid = %*instance),
    err
)]
pub(crate) async fn handler(
    instance: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<StatusCode, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    state
        .sessions
        .delete_instance(instance.into_inner().into())
        .await
        .map_err(into_status_error)?;

    Ok(StatusCode::OK)
}
