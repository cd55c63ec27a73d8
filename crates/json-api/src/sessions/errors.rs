//! Session Errors

use salvo::http::StatusCode;
use tracing::error;

use switchboard_app::sessions::SessionError;

use crate::extensions::ApiError;

pub(crate) fn into_status_error(error: SessionError) -> ApiError {
    let status = match &error {
        SessionError::NotFound | SessionError::NoQrCode => StatusCode::NOT_FOUND,
        SessionError::UnknownToken | SessionError::NotLoggedIn => StatusCode::UNAUTHORIZED,
        SessionError::IsPairing | SessionError::NotPairing | SessionError::InvalidName => {
            StatusCode::BAD_REQUEST
        }
        SessionError::AlreadyLoggedIn
        | SessionError::NotBanned
        | SessionError::AlreadyDisconnected
        | SessionError::AlreadyLoggedOut
        | SessionError::AlreadyPaired
        | SessionError::Busy => StatusCode::CONFLICT,
        SessionError::Banned { .. } => StatusCode::LOCKED,
        SessionError::AlreadyConnected => StatusCode::ALREADY_REPORTED,
        SessionError::IsConnecting => StatusCode::ACCEPTED,
        SessionError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        SessionError::Client { .. } | SessionError::Lookup(_) | SessionError::Storage { .. } => {
            error!(code = error.code(), "session operation failed: {error:#}");

            return ApiError::internal();
        }
    };

    ApiError::new(status, error.code(), message(&error))
}

fn message(error: &SessionError) -> String {
    match error {
        SessionError::Banned {
            reason: Some(reason),
            expires_at: Some(expires_at),
        } => format!("{error}: {reason} (until {expires_at})"),
        SessionError::Banned {
            reason: Some(reason),
            expires_at: None,
        } => format!("{error}: {reason}"),
        _ => error.to_string(),
    }
}
