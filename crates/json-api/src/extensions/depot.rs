//! Depot helper extensions.

use std::any::Any;

use salvo::prelude::Depot;
use tracing::error;

use crate::{extensions::ApiError, instances::InstanceContext};

/// Typed access to request-scoped values.
pub(crate) trait DepotExt {
    fn obtain_or_500<T: Any + Send + Sync>(&self) -> Result<&T, ApiError>;

    fn insert_instance(&mut self, context: InstanceContext);

    fn instance_or_500(&self) -> Result<&InstanceContext, ApiError>;
}

impl DepotExt for Depot {
    fn obtain_or_500<T: Any + Send + Sync>(&self) -> Result<&T, ApiError> {
        self.obtain::<T>().map_err(|_ignored| {
            error!("missing {} in request depot", std::any::type_name::<T>());

            ApiError::internal()
        })
    }

    fn insert_instance(&mut self, context: InstanceContext) {
        self.inject(context);
    }

    fn instance_or_500(&self) -> Result<&InstanceContext, ApiError> {
        self.obtain_or_500::<InstanceContext>()
    }
}
