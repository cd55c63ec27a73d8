//! Instances Repository

use async_trait::async_trait;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use mockall::automock;
use sqlx::{FromRow, PgPool, Postgres, Row, postgres::PgRow, query, query_as};

use crate::domain::instances::{
    data::{InstanceFilter, NewInstance},
    errors::InstancesRepositoryError,
    records::{InstanceRecord, InstanceStatus, InstanceUuid},
};

const CREATE_INSTANCE_SQL: &str = include_str!("sql/create_instance.sql");
const GET_INSTANCE_BY_UUID_SQL: &str = include_str!("sql/get_instance_by_uuid.sql");
const GET_INSTANCE_BY_TOKEN_SQL: &str = include_str!("sql/get_instance_by_token.sql");
const LIST_INSTANCES_BY_STATUS_SQL: &str = include_str!("sql/list_instances_by_status.sql");
const SAVE_INSTANCE_SQL: &str = include_str!("sql/save_instance.sql");
const DELETE_INSTANCE_SQL: &str = include_str!("sql/delete_instance.sql");

#[automock]
#[async_trait]
/// Durable storage for instance records.
pub trait InstancesRepository: Send + Sync {
    /// Persists a new instance in the `LoggedOut` state.
    async fn create(&self, instance: NewInstance) -> Result<InstanceRecord, InstancesRepositoryError>;

    /// Loads the single instance matching `filter`.
    async fn get(&self, filter: InstanceFilter) -> Result<InstanceRecord, InstancesRepositoryError>;

    /// Loads every instance matching `filter`.
    async fn list(
        &self,
        filter: InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, InstancesRepositoryError>;

    /// Writes a snapshot of an existing instance.
    async fn save(&self, instance: &InstanceRecord) -> Result<(), InstancesRepositoryError>;

    /// Removes an instance row.
    async fn delete(&self, uuid: InstanceUuid) -> Result<(), InstancesRepositoryError>;
}

#[derive(Debug, Clone)]
/// PostgreSQL-backed instances repository.
pub struct PgInstancesRepository {
    pool: PgPool,
}

impl PgInstancesRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstancesRepository for PgInstancesRepository {
    async fn create(&self, instance: NewInstance) -> Result<InstanceRecord, InstancesRepositoryError> {
        query_as::<Postgres, InstanceRecord>(CREATE_INSTANCE_SQL)
            .bind(instance.uuid)
            .bind(instance.name)
            .bind(instance.token)
            .fetch_one(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn get(&self, filter: InstanceFilter) -> Result<InstanceRecord, InstancesRepositoryError> {
        let statement = match &filter {
            InstanceFilter::Uuid(uuid) => {
                query_as::<Postgres, InstanceRecord>(GET_INSTANCE_BY_UUID_SQL)
                    .bind(*uuid)
            }
            InstanceFilter::Token(token) => {
                query_as::<Postgres, InstanceRecord>(GET_INSTANCE_BY_TOKEN_SQL).bind(token.clone())
            }
            InstanceFilter::Status(status) => {
                query_as::<Postgres, InstanceRecord>(LIST_INSTANCES_BY_STATUS_SQL)
                    .bind(status.as_str())
            }
        };

        statement.fetch_one(&self.pool).await.map_err(Into::into)
    }

    async fn list(
        &self,
        filter: InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, InstancesRepositoryError> {
        match filter {
            InstanceFilter::Status(status) => {
                query_as::<Postgres, InstanceRecord>(LIST_INSTANCES_BY_STATUS_SQL)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
                    .map_err(Into::into)
            }
            single @ (InstanceFilter::Uuid(_) | InstanceFilter::Token(_)) => {
                match self.get(single).await {
                    Ok(instance) => Ok(vec![instance]),
                    Err(InstancesRepositoryError::NotFound) => Ok(Vec::new()),
                    Err(error) => Err(error),
                }
            }
        }
    }

    async fn save(&self, instance: &InstanceRecord) -> Result<(), InstancesRepositoryError> {
        let result = query(SAVE_INSTANCE_SQL)
            .bind(instance.uuid)
            .bind(&instance.name)
            .bind(&instance.token)
            .bind(&instance.phone)
            .bind(&instance.jid)
            .bind(&instance.lid)
            .bind(&instance.device)
            .bind(instance.status.as_str())
            .bind(&instance.qr_code)
            .bind(instance.qr_expires_at.map(SqlxTimestamp::from))
            .bind(&instance.reason)
            .bind(instance.last_connected_at.map(SqlxTimestamp::from))
            .bind(instance.last_login_at.map(SqlxTimestamp::from))
            .bind(instance.banned_at.map(SqlxTimestamp::from))
            .bind(instance.ban_expires_at.map(SqlxTimestamp::from))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(InstancesRepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete(&self, uuid: InstanceUuid) -> Result<(), InstancesRepositoryError> {
        let result = query(DELETE_INSTANCE_SQL)
            .bind(uuid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(InstancesRepositoryError::NotFound);
        }

        Ok(())
    }
}

impl<'r> FromRow<'r, PgRow> for InstanceRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let status = row
            .try_get::<String, _>("status")?
            .parse::<InstanceStatus>()
            .map_err(|source| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: Box::new(source),
            })?;

        Ok(Self {
            uuid: row.try_get("uuid")?,
            name: row.try_get("name")?,
            token: row.try_get("token")?,
            phone: row.try_get("phone")?,
            jid: row.try_get("jid")?,
            lid: row.try_get("lid")?,
            device: row.try_get("device")?,
            status,
            qr_code: row.try_get("qr_code")?,
            qr_expires_at: optional_timestamp(row, "qr_expires_at")?,
            reason: row.try_get("reason")?,
            last_connected_at: optional_timestamp(row, "last_connected_at")?,
            last_login_at: optional_timestamp(row, "last_login_at")?,
            banned_at: optional_timestamp(row, "banned_at")?,
            ban_expires_at: optional_timestamp(row, "ban_expires_at")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

fn optional_timestamp(row: &PgRow, column: &str) -> sqlx::Result<Option<jiff::Timestamp>> {
    Ok(row
        .try_get::<Option<SqlxTimestamp>, _>(column)?
        .map(SqlxTimestamp::to_jiff))
}
