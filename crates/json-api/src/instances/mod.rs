//! Instance request context

mod context;
pub(crate) mod middleware;

pub(crate) use context::InstanceContext;
