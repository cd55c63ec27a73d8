//! Unban Instance Handler

use std::sync::Arc;

use salvo::{oapi::extract::PathParam, prelude::*};
use uuid::Uuid;

use crate::{
    extensions::*,
    sessions::{errors::into_status_error, models::InstanceResponse},
    state::State,
};

/// Unban Instance Handler
#[endpoint(
    tags("admin"),
    summary = "Lift Ban",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Ban lifted"),
        (status_code = StatusCode::CONFLICT, description = "Instance is not banned"),
        (status_code = StatusCode::NOT_FOUND, description = "Instance not found"),
    ),
)]
#[tracing::instrument(
    name = "admin.instances.unban",
    skip(instance, depot),
    fields(instance_uuid = %*instance),
    err
)]
pub(crate) async fn handler(
    instance: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<Json<InstanceResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let instance = state
        .sessions
        .unban(instance.into_inner().into())
        .await
        .map_err(into_status_error)?;

    tracing::info!(instance_uuid = %instance.uuid, "lifted ban");

    Ok(Json(instance.into()))
}
