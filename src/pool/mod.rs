//! Alias-addressed connection pools.
//!
//! A [`PoolRegistry`] maps logical names to live pools for one backend kind.
//! Pools are created lazily on first [`create`](PoolRegistry::create), reused
//! by every later caller of the same alias, and torn down explicitly with
//! [`close`](PoolRegistry::close) or [`close_all`](PoolRegistry::close_all).
//! Registries are plain values owned by the application; share one with
//! `Arc` instead of reaching for a process-wide global.
//!
//! Two backends ship with the crate: [`redis::RedisBackend`] and
//! [`postgres::PostgresBackend`]. Anything else can plug in through the
//! [`PoolBackend`] trait.
//!
//! # Usage
//!
//! ```rust,no_run
//! use frontier_q::{PoolRegistry, RedisBackend, RedisPoolParams};
//!
//! # async fn run() -> frontier_q::Result<()> {
//! let registry = PoolRegistry::new(RedisBackend);
//! registry
//!     .create(&RedisPoolParams { alias: Some("cache".into()), ..Default::default() })
//!     .await?;
//!
//! // Borrow a connection, health-checked, returned on every exit path.
//! let mut scope = registry.scope("cache", true).await?;
//! let pong: String = redis::cmd("PING").query_async(&mut *scope).await?;
//! assert_eq!(pong, "PONG");
//! drop(scope);
//!
//! registry.close_all().await?;
//! # Ok(())
//! # }
//! ```

pub mod postgres;
pub mod redis;
mod scope;

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub use scope::ConnectionScope;

/// One kind of poolable backend: how to name, build, check, and dispose of
/// its pools and connections.
///
/// Implementations are cheap handle types; the registry keeps one instance
/// and calls it for every pool it manages.
#[async_trait]
pub trait PoolBackend: Send + Sync + 'static {
    /// Connection parameters accepted by [`PoolRegistry::create`].
    type Params: Clone + Send + Sync;
    /// The pool itself; cloning must yield a handle to the same pool.
    type Pool: Clone + Send + Sync + 'static;
    /// An exclusively owned connection that returns to its pool on drop.
    type Connection: Send;

    /// Resolve the alias for these parameters.
    ///
    /// An explicit alias in the parameters is used verbatim; otherwise the
    /// alias derives deterministically from the connection target, so equal
    /// parameters always resolve to the same alias. Pure: no I/O, no state.
    fn alias_of(&self, params: &Self::Params) -> String;

    /// Copy of `params` with `alias` as the explicit alias, unless the
    /// parameters already carry one.
    fn with_alias(&self, params: &Self::Params, alias: &str) -> Self::Params;

    /// Build a fresh pool. Called by the registry outside its map lock.
    async fn build_pool(&self, params: &Self::Params) -> Result<Self::Pool>;

    /// Borrow one connection from the pool.
    async fn acquire(&self, pool: &Self::Pool) -> Result<Self::Connection>;

    /// Health-check one connection; an unhealthy connection is an
    /// [`Error::Connection`].
    async fn ping(&self, conn: &mut Self::Connection) -> Result<()>;

    /// Release the pool's resources. Outstanding borrows stay valid until
    /// dropped; new acquisitions fail.
    async fn dispose(&self, pool: Self::Pool) -> Result<()>;
}

/// Registry of live pools for one backend, keyed by alias.
pub struct PoolRegistry<B: PoolBackend> {
    backend: B,
    pools: RwLock<HashMap<String, B::Pool>>,
}

impl<B: PoolBackend> PoolRegistry<B> {
    /// Create an empty registry.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the alias these parameters would register under.
    pub fn alias_of(&self, params: &B::Params) -> String {
        self.backend.alias_of(params)
    }

    /// Return the pool for these parameters, building it on first use.
    ///
    /// Idempotent per alias: when a pool already exists the existing pool is
    /// returned and the new parameters are ignored, so the first creation
    /// wins. Two tasks racing to create the same alias may both build a
    /// pool; the loser's pool is disposed, never registered, and the loser
    /// receives the winner's pool. The race is deliberate: serializing every
    /// create behind one lock would stall unrelated aliases on slow builds.
    pub async fn create(&self, params: &B::Params) -> Result<B::Pool> {
        let alias = self.backend.alias_of(params);
        if let Some(existing) = self.pools.read().await.get(&alias) {
            return Ok(existing.clone());
        }

        let fresh = self.backend.build_pool(params).await?;

        let mut pools = self.pools.write().await;
        match pools.entry(alias.clone()) {
            Entry::Occupied(entry) => {
                let existing = entry.get().clone();
                drop(pools);
                debug!(alias = %alias, "pool already registered, disposing the newer build");
                self.backend.dispose(fresh).await?;
                Ok(existing)
            }
            Entry::Vacant(slot) => {
                slot.insert(fresh.clone());
                info!(alias = %alias, "pool registered");
                Ok(fresh)
            }
        }
    }

    /// Create one pool per entry of an alias-to-parameters mapping, the way
    /// host applications configure their stores. The mapping key becomes the
    /// explicit alias for entries whose parameters do not carry one.
    pub async fn create_all(&self, entries: &HashMap<String, B::Params>) -> Result<()> {
        for (alias, params) in entries {
            self.create(&self.backend.with_alias(params, alias)).await?;
        }
        Ok(())
    }

    /// Look up a registered pool. Never creates one.
    pub async fn get_pool(&self, alias: &str) -> Result<B::Pool> {
        self.pools
            .read()
            .await
            .get(alias)
            .cloned()
            .ok_or_else(|| Error::PoolNotFound(alias.to_string()))
    }

    /// Acquire a scoped connection from the pool registered under `alias`.
    ///
    /// With `health_check` set, the connection is pinged before it is handed
    /// out; a failed ping surfaces as [`Error::Connection`].
    pub async fn scope(&self, alias: &str, health_check: bool) -> Result<ConnectionScope<B>> {
        let pool = self.get_pool(alias).await?;
        ConnectionScope::acquire(&self.backend, &pool, health_check).await
    }

    /// Remove the alias and dispose of its pool. No-op for unknown aliases.
    ///
    /// The entry disappears before disposal starts, so a concurrent caller
    /// either sees the live pool or no pool, never a half-closed one.
    pub async fn close(&self, alias: &str) -> Result<()> {
        let removed = self.pools.write().await.remove(alias);
        match removed {
            Some(pool) => {
                self.backend.dispose(pool).await?;
                info!(alias = %alias, "pool closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Close every registered pool, one after another, in no particular
    /// order.
    ///
    /// Every pool is disposed even when an earlier disposal fails; the
    /// first failure is returned once the sweep is complete.
    pub async fn close_all(&self) -> Result<()> {
        let drained: Vec<(String, B::Pool)> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        };
        let mut first_failure = None;
        for (alias, pool) in drained {
            match self.backend.dispose(pool).await {
                Ok(()) => info!(alias = %alias, "pool closed"),
                Err(err) => {
                    warn!(alias = %alias, error = %err, "pool disposal failed");
                    first_failure.get_or_insert(err);
                }
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Snapshot of the currently registered aliases.
    pub async fn aliases(&self) -> Vec<String> {
        self.pools.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.pools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pools.read().await.is_empty()
    }
}

impl<B: PoolBackend + Default> Default for PoolRegistry<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}
