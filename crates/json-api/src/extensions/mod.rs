//! Extension traits

mod depot;
mod error;

pub(crate) use depot::DepotExt as _;
pub(crate) use error::{ApiError, ErrorBody};
