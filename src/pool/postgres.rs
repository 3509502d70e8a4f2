//! Postgres pool backend, built on `sqlx`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres};
use tracing::info;

use crate::error::{Error, Result};
use crate::pool::{PoolBackend, PoolRegistry};

/// Registry of Postgres pools.
pub type PostgresRegistry = PoolRegistry<PostgresBackend>;

/// Connection parameters for one Postgres database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresPoolParams {
    /// Explicit registry alias. When absent the alias derives from
    /// [`target`](Self::target).
    pub alias: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub dbname: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for PostgresPoolParams {
    fn default() -> Self {
        Self {
            alias: None,
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: None,
            dbname: "postgres".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 30_000,
        }
    }
}

impl PostgresPoolParams {
    /// `host:port/dbname`, the credential-free form used for derived
    /// aliases and log output.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.dbname)
    }
}

/// [`PoolBackend`] implementation for Postgres.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresBackend;

#[async_trait]
impl PoolBackend for PostgresBackend {
    type Params = PostgresPoolParams;
    type Pool = PgPool;
    type Connection = sqlx::pool::PoolConnection<Postgres>;

    fn alias_of(&self, params: &PostgresPoolParams) -> String {
        params.alias.clone().unwrap_or_else(|| params.target())
    }

    fn with_alias(&self, params: &PostgresPoolParams, alias: &str) -> PostgresPoolParams {
        let mut params = params.clone();
        params.alias.get_or_insert_with(|| alias.to_string());
        params
    }

    async fn build_pool(&self, params: &PostgresPoolParams) -> Result<PgPool> {
        if params.max_connections == 0 {
            return Err(Error::Configuration(
                "postgres pool max_connections must be at least 1".to_string(),
            ));
        }

        let mut options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.user)
            .database(&params.dbname);
        if let Some(password) = &params.password {
            options = options.password(password);
        }

        // connect_with opens a first connection, so an unreachable server
        // fails here rather than on first use.
        let pool = PgPoolOptions::new()
            .max_connections(params.max_connections)
            .acquire_timeout(Duration::from_millis(params.acquire_timeout_ms))
            .connect_with(options)
            .await
            .map_err(|e| Error::Connection(format!("failed to connect to postgres: {}", e)))?;

        info!(
            server = %params.target(),
            max_connections = params.max_connections,
            "postgres pool created"
        );
        Ok(pool)
    }

    async fn acquire(&self, pool: &PgPool) -> Result<sqlx::pool::PoolConnection<Postgres>> {
        pool.acquire()
            .await
            .map_err(|e| Error::Connection(format!("failed to get postgres connection: {}", e)))
    }

    async fn ping(&self, conn: &mut sqlx::pool::PoolConnection<Postgres>) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&mut **conn)
            .await
            .map_err(|e| Error::Connection(format!("postgres ping failed: {}", e)))?;
        Ok(())
    }

    async fn dispose(&self, pool: PgPool) -> Result<()> {
        pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_defaults_to_the_connection_target() {
        let backend = PostgresBackend;
        let params = PostgresPoolParams {
            dbname: "frontier".to_string(),
            ..Default::default()
        };
        assert_eq!(backend.alias_of(&params), "127.0.0.1:5432/frontier");
    }

    #[test]
    fn explicit_alias_wins_over_the_target() {
        let backend = PostgresBackend;
        let params = PostgresPoolParams {
            alias: Some("state".to_string()),
            ..Default::default()
        };
        assert_eq!(backend.alias_of(&params), "state");
    }

    #[test]
    fn with_alias_keeps_an_existing_alias() {
        let backend = PostgresBackend;
        let unnamed = PostgresPoolParams::default();
        assert_eq!(
            backend.with_alias(&unnamed, "state").alias.as_deref(),
            Some("state")
        );
    }

    #[test]
    fn sparse_config_fills_defaults() {
        let params: PostgresPoolParams =
            serde_json::from_str(r#"{ "dbname": "frontier", "user": "crawler" }"#).unwrap();
        assert_eq!(params.dbname, "frontier");
        assert_eq!(params.user, "crawler");
        assert_eq!(params.port, 5432);
        assert_eq!(params.max_connections, 10);
    }

    #[tokio::test]
    async fn zero_sized_pool_is_rejected() {
        let backend = PostgresBackend;
        let params = PostgresPoolParams {
            max_connections: 0,
            ..Default::default()
        };
        let err = backend.build_pool(&params).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "got {:?}", err);
    }
}
