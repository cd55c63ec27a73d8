//! Admin Handlers

pub(crate) mod create;
pub(crate) mod delete;
pub(crate) mod rename;
pub(crate) mod renew_token;
pub(crate) mod unban;
