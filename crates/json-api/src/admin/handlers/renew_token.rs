//! Renew Token Handler

use std::sync::Arc;

use salvo::{oapi::extract::PathParam, prelude::*};
use uuid::Uuid;

use crate::{
    admin::models::InstanceCredentialsResponse, extensions::*,
    sessions::errors::into_status_error, state::State,
};

/// Renew Token Handler
///
/// Replaces the instance's token. The previous token stops resolving at once.
#[endpoint(
    tags("admin"),
    summary = "Renew Instance Token",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Token renewed"),
        (status_code = StatusCode::NOT_FOUND, description = "Instance not found"),
    ),
)]
#[tracing::instrument(
    name = "admin.instances.renew_token",
    skip(instance, depot),
    fields(instance_uuid = %*instance),
    err
)]
pub(crate) async fn handler(
    instance: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<Json<InstanceCredentialsResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let instance = state
        .sessions
        .renew_token(instance.into_inner().into())
        .await
        .map_err(into_status_error)?;

    Ok(Json(instance.into()))
}
