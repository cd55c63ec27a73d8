//! QR Code Handler

use std::sync::Arc;

use salvo::prelude::*;

use crate::{
    extensions::*,
    sessions::{errors::into_status_error, models::QrResponse},
    state::State,
};

/// QR Code Handler
///
/// Returns the current pairing payload, waiting briefly for the first one.
#[endpoint(
    tags("session"),
    summary = "Get QR Code",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Pairing payload"),
        (status_code = StatusCode::BAD_REQUEST, description = "Instance is not pairing"),
        (status_code = StatusCode::NOT_FOUND, description = "No payload generated yet"),
        (status_code = StatusCode::CONFLICT, description = "Pairing already completed"),
    ),
)]
#[tracing::instrument(
    name = "sessions.http.qr",
    skip(depot),
    fields(instance_uuid = tracing::field::Empty),
    err
)]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<QrResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let instance = depot.instance_or_500()?;

    tracing::Span::current().record("instance_uuid", tracing::field::display(instance.uuid));

    let qr_code = state
        .sessions
        .qr_code(instance.uuid)
        .await
        .map_err(into_status_error)?;

    Ok(Json(QrResponse { qr_code }))
}
