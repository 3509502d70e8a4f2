//! Declarative settings for the crawl frontier.
//!
//! [`FrontierSettings`] mirrors the configuration section a host
//! application hands to the framework: queue shape, wire codec, and named
//! pool parameter blocks. Every field has a default, so a sparse document
//! like `{ "queue_kind": "fifo" }` deserializes cleanly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codec::CodecKind;
use crate::error::Result;
use crate::pool::postgres::{PostgresPoolParams, PostgresRegistry};
use crate::pool::redis::{RedisPoolParams, RedisRegistry};
use crate::queue::{FrontierBuilder, QueueKind, DEFAULT_KEY_TEMPLATE};

/// Top-level frontier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontierSettings {
    /// Ordering discipline for request queues.
    pub queue_kind: QueueKind,
    /// Key template; `{name}` is replaced by the queue owner's name.
    pub queue_key: String,
    /// Wire codec for queued requests.
    pub codec: CodecKind,
    /// Redis pool parameters, keyed by alias.
    pub redis: HashMap<String, RedisPoolParams>,
    /// Postgres pool parameters, keyed by alias.
    pub postgres: HashMap<String, PostgresPoolParams>,
}

impl Default for FrontierSettings {
    fn default() -> Self {
        Self {
            queue_kind: QueueKind::default(),
            queue_key: DEFAULT_KEY_TEMPLATE.to_string(),
            codec: CodecKind::default(),
            redis: HashMap::new(),
            postgres: HashMap::new(),
        }
    }
}

impl FrontierSettings {
    /// A queue builder carrying these settings.
    pub fn frontier(&self) -> FrontierBuilder {
        FrontierBuilder::new()
            .kind(self.queue_kind)
            .key_template(self.queue_key.clone())
            .codec(self.codec)
    }

    /// Register every configured Redis pool, using the map keys as
    /// fallback aliases.
    pub async fn seed_redis(&self, registry: &RedisRegistry) -> Result<()> {
        registry.create_all(&self.redis).await
    }

    /// Register every configured Postgres pool, using the map keys as
    /// fallback aliases.
    pub async fn seed_postgres(&self, registry: &PostgresRegistry) -> Result<()> {
        registry.create_all(&self.postgres).await
    }
}
