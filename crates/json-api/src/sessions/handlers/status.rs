//! Session Status Handler

use salvo::prelude::*;

use crate::{extensions::*, sessions::models::InstanceResponse};

/// Session Status Handler
///
/// Returns the instance as seen after its connection was ensured.
#[endpoint(
    tags("session"),
    summary = "Session Status",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Connected instance"),
        (status_code = StatusCode::ACCEPTED, description = "Connection in progress"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Device has never been paired"),
    ),
)]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<InstanceResponse>, ApiError> {
    let instance = depot.instance_or_500()?;

    Ok(Json(instance.instance.clone().into()))
}
