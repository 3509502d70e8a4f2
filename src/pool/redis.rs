//! Redis pool backend, built on `deadpool-redis`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::pool::{PoolBackend, PoolRegistry};

/// Registry of Redis pools.
pub type RedisRegistry = PoolRegistry<RedisBackend>;

/// Connection parameters for one Redis server.
///
/// All fields have defaults, so a sparse config section like
/// `{ "host": "redis.internal" }` is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisPoolParams {
    /// Explicit registry alias. When absent the alias derives from
    /// [`target`](Self::target).
    pub alias: Option<String>,
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Upper bound on pooled connections.
    pub max_size: usize,
    /// How long an acquire may wait for a free connection.
    pub wait_timeout_ms: Option<u64>,
    /// How long establishing a new connection may take.
    pub create_timeout_ms: Option<u64>,
    /// How long recycling a returned connection may take.
    pub recycle_timeout_ms: Option<u64>,
}

impl Default for RedisPoolParams {
    fn default() -> Self {
        Self {
            alias: None,
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            username: None,
            password: None,
            max_size: 50,
            wait_timeout_ms: Some(30_000),
            create_timeout_ms: Some(30_000),
            recycle_timeout_ms: None,
        }
    }
}

impl RedisPoolParams {
    /// `host:port/db`, the credential-free form used for derived aliases
    /// and log output.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.db)
    }
}

/// [`PoolBackend`] implementation for Redis.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisBackend;

#[async_trait]
impl PoolBackend for RedisBackend {
    type Params = RedisPoolParams;
    type Pool = deadpool_redis::Pool;
    type Connection = deadpool_redis::Connection;

    fn alias_of(&self, params: &RedisPoolParams) -> String {
        params.alias.clone().unwrap_or_else(|| params.target())
    }

    fn with_alias(&self, params: &RedisPoolParams, alias: &str) -> RedisPoolParams {
        let mut params = params.clone();
        params.alias.get_or_insert_with(|| alias.to_string());
        params
    }

    async fn build_pool(&self, params: &RedisPoolParams) -> Result<deadpool_redis::Pool> {
        if params.max_size == 0 {
            return Err(Error::Configuration(
                "redis pool max_size must be at least 1".to_string(),
            ));
        }

        let cfg = deadpool_redis::Config {
            connection: Some(deadpool_redis::ConnectionInfo {
                addr: deadpool_redis::ConnectionAddr::Tcp(params.host.clone(), params.port),
                redis: deadpool_redis::RedisConnectionInfo {
                    db: params.db,
                    username: params.username.clone(),
                    password: params.password.clone(),
                    protocol: deadpool_redis::ProtocolVersion::RESP3,
                },
            }),
            pool: Some(deadpool_redis::PoolConfig {
                max_size: params.max_size,
                timeouts: deadpool_redis::Timeouts {
                    wait: params.wait_timeout_ms.map(Duration::from_millis),
                    create: params.create_timeout_ms.map(Duration::from_millis),
                    recycle: params.recycle_timeout_ms.map(Duration::from_millis),
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        let pool = cfg
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| Error::Configuration(format!("invalid redis pool config: {}", e)))?;

        // The pool is lazy; prove the server is reachable before handing
        // it out.
        let mut conn = self.acquire(&pool).await?;
        if let Err(err) = self.ping(&mut conn).await {
            warn!(server = %params.target(), error = %err, "redis pool failed verification");
            return Err(err);
        }
        drop(conn);

        info!(
            server = %params.target(),
            max_size = params.max_size,
            "redis pool created"
        );
        Ok(pool)
    }

    async fn acquire(&self, pool: &deadpool_redis::Pool) -> Result<deadpool_redis::Connection> {
        pool.get()
            .await
            .map_err(|e| Error::Connection(format!("failed to get redis connection: {}", e)))
    }

    async fn ping(&self, conn: &mut deadpool_redis::Connection) -> Result<()> {
        let _: String = redis::cmd("PING")
            .query_async(&mut **conn)
            .await
            .map_err(|e| Error::Connection(format!("redis ping failed: {}", e)))?;
        Ok(())
    }

    async fn dispose(&self, pool: deadpool_redis::Pool) -> Result<()> {
        // Poisons every clone of the pool handle; checked-out connections
        // stay usable until they drop.
        pool.close();
        Ok(())
    }
}
