//! Session Handlers

use std::time::Duration;

use salvo::oapi::extract::QueryParam;

pub(crate) mod connect;
pub(crate) mod disconnect;
pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod ping;
pub(crate) mod qr;
pub(crate) mod status;

/// Optional `timeout` query parameter, in seconds.
fn timeout_param(timeout: QueryParam<u64, false>) -> Option<Duration> {
    timeout.into_inner().map(Duration::from_secs)
}
