//! PostgreSQL-backed durable parameter store.

use super::{ParameterKey, ParameterStore, ParameterStoreError};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS stage_parameters (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    version     BIGINT NOT NULL DEFAULT 1,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const UPSERT_SQL: &str = r#"
INSERT INTO stage_parameters (key, value, version, updated_at)
VALUES ($1, $2, 1, NOW())
ON CONFLICT (key) DO UPDATE
    SET value = EXCLUDED.value,
        version = stage_parameters.version + 1,
        updated_at = NOW()
RETURNING version
"#;

const SELECT_SQL: &str = "SELECT value FROM stage_parameters WHERE key = $1";

#[derive(Debug, Clone)]
pub struct PgParameterStore {
    pool: PgPool,
}

impl PgParameterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, ParameterStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        info!(max_connections = max_connections, "Connected parameter store pool");
        Ok(Self::new(pool))
    }

    pub async fn ensure_schema(&self) -> Result<(), ParameterStoreError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ParameterStore for PgParameterStore {
    async fn put(&self, key: &ParameterKey, value: &str) -> Result<i64, ParameterStoreError> {
        let version: i64 = sqlx::query_scalar(UPSERT_SQL)
            .bind(key.as_str())
            .bind(value)
            .fetch_one(&self.pool)
            .await?;

        debug!(key = %key, version = version, "Parameter written");
        Ok(version)
    }

    async fn get(&self, key: &ParameterKey) -> Result<String, ParameterStoreError> {
        let value: Option<String> = sqlx::query_scalar(SELECT_SQL)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        value.ok_or_else(|| ParameterStoreError::NotFound {
            key: key.to_string(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
