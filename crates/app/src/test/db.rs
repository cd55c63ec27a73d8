//! Per-test Postgres databases on one shared container.

use once_cell::sync::Lazy;
use sqlx::{Connection, PgConnection, PgPool};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres as PostgresImage;
use testresult::TestResult;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::database::{self, PoolSettings};

/// Started on first use and reused by every test in the binary.
static POSTGRES: Lazy<OnceCell<ContainerAsync<PostgresImage>>> = Lazy::new(OnceCell::new);

/// A freshly migrated database that belongs to a single test.
#[derive(Debug)]
pub(crate) struct TestDb {
    pool: PgPool,
}

impl TestDb {
    pub(crate) async fn new() -> TestResult<Self> {
        let container = POSTGRES
            .get_or_try_init(|| PostgresImage::default().start())
            .await?;

        let server = format!(
            "postgres://postgres:postgres@{}:{}",
            container.get_host().await?,
            container.get_host_port_ipv4(5432).await?,
        );

        // Names are generated here, never taken from input.
        let name = format!("instances_{}", Uuid::now_v7().simple());

        let mut admin = PgConnection::connect(&format!("{server}/postgres")).await?;

        sqlx::query(&format!(r#"CREATE DATABASE "{name}""#))
            .execute(&mut admin)
            .await?;

        admin.close().await?;

        let pool = database::connect(&PoolSettings::new(format!("{server}/{name}"))).await?;

        database::migrate(&pool).await?;

        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
