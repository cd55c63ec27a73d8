//! Shared application domain, persistence, and session orchestration modules.

pub mod context;
pub mod database;
pub mod domain;
pub mod sessions;


mod uuids;
