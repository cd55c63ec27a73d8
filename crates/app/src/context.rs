//! App Context

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use sqlx::{PgPool, migrate::MigrateError};
use thiserror::Error;

use crate::{
    database::{self, PoolSettings},
    domain::instances::PgInstancesRepository,
    sessions::{
        BridgeClient, BridgeConfig, InstanceRegistry, SessionConfig, SessionOrchestrator,
        SessionService,
    },
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("failed to apply database migrations")]
    Migrations(#[source] MigrateError),
}

#[derive(Clone)]
pub struct AppContext {
    pub pool: PgPool,
    pub sessions: Arc<dyn SessionService>,

    /// Concrete orchestrator, for process lifecycle hooks (restore, shutdown).
    pub orchestrator: SessionOrchestrator,
}

impl Debug for AppContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AppContext")
            .field("pool", &self.pool)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build application context: connect and migrate the database, then
    /// wire the registry, bridge client, and orchestrator together.
    ///
    /// # Errors
    ///
    /// Returns an error when establishing a database connection or applying
    /// migrations fails.
    pub async fn connect(
        database: &PoolSettings,
        bridge: BridgeConfig,
        sessions: SessionConfig,
    ) -> Result<Self, AppInitError> {
        let pool = database::connect(database)
            .await
            .map_err(AppInitError::Database)?;

        database::migrate(&pool)
            .await
            .map_err(AppInitError::Migrations)?;

        let orchestrator = SessionOrchestrator::new(
            Arc::new(InstanceRegistry::new()),
            Arc::new(PgInstancesRepository::new(pool.clone())),
            Arc::new(BridgeClient::new(bridge)),
            sessions,
        );

        Ok(Self {
            pool,
            sessions: Arc::new(orchestrator.clone()),
            orchestrator,
        })
    }
}
