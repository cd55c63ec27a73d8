//! Request correlation IDs.

use salvo::{http::header::HeaderValue, prelude::Response};
use tracing::warn;
use uuid::Uuid;

pub(super) const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Echoes a caller's ID when it is short visible ASCII, otherwise mints a v7
/// UUID so every log line still correlates.
pub(super) fn resolve_request_id(header_value: Option<&str>) -> String {
    header_value
        .map(str::trim)
        .filter(|value| is_acceptable(value))
        .map_or_else(|| Uuid::now_v7().to_string(), str::to_owned)
}

pub(super) fn set_request_id_header(res: &mut Response, request_id: &str) {
    match HeaderValue::from_str(request_id) {
        Ok(value) => {
            res.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        Err(source) => {
            warn!(request_id, "could not encode request id for response header: {source}");
        }
    }
}

fn is_acceptable(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value.bytes().all(|byte| byte.is_ascii_graphic())
}
