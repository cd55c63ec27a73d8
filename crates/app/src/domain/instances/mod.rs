//! Instances

pub mod data;
pub mod errors;
pub mod records;
mod repository;
pub mod token;

pub use errors::InstancesRepositoryError;
pub use repository::*;
