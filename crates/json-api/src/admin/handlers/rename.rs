//! Rename Instance Handler

use std::sync::Arc;

use salvo::{
    oapi::extract::{JsonBody, PathParam},
    prelude::*,
};
use uuid::Uuid;

use crate::{
    admin::models::InstanceNameRequest,
    extensions::*,
    sessions::{errors::into_status_error, models::InstanceResponse},
    state::State,
};

/// Rename Instance Handler
#[endpoint(
    tags("admin"),
    summary = "Rename Instance",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Instance renamed"),
        (status_code = StatusCode::BAD_REQUEST, description = "Invalid name"),
        (status_code = StatusCode::NOT_FOUND, description = "Instance not found"),
    ),
)]
#[tracing::instrument(
    name = "admin.instances.rename",
    skip(instance, json, depot),
    fields(instance_uuid = %*instance),
    err
)]
pub(crate) async fn handler(
    instance: PathParam<Uuid>,
    json: JsonBody<InstanceNameRequest>,
    depot: &mut Depot,
) -> Result<Json<InstanceResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let instance = state
        .sessions
        .rename(instance.into_inner().into(), json.into_inner().name)
        .await
        .map_err(into_status_error)?;

    Ok(Json(instance.into()))
}
