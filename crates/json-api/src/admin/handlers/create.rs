//! Create Instance Handler

use std::sync::Arc;

use salvo::{oapi::extract::JsonBody, prelude::*};

use crate::{
    admin::models::{InstanceCredentialsResponse, InstanceNameRequest},
    extensions::*,
    sessions::errors::into_status_error,
    state::State,
};

/// Create Instance Handler
///
/// Creates a logged-out instance and returns it with its token.
#[endpoint(
    tags("admin"),
    summary = "Create Instance",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::CREATED, description = "Instance created"),
        (status_code = StatusCode::BAD_REQUEST, description = "Invalid name"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Missing or invalid admin token"),
    ),
)]
#[tracing::instrument(name = "admin.instances.create", skip(json, depot, res), err)]
pub(crate) async fn handler(
    json: JsonBody<InstanceNameRequest>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<InstanceCredentialsResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let instance = state
        .sessions
        .create_instance(json.into_inner().name)
        .await
        .map_err(into_status_error)?;

    tracing::info!(instance_uuid = %instance.uuid, "created instance");

    res.status_code(StatusCode::CREATED);

    Ok(Json(instance.into()))
}
