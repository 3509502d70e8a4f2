//! Distributed crawl-request queue over Redis, with alias-addressed
//! connection pools.
//!
//! `frontier_q` is the scheduling core of a crawler: cooperating workers
//! push [`CrawlRequest`]s into a shared queue and claim them back one at a
//! time, each request delivered to exactly one worker. The queue lives
//! entirely in Redis, so workers in different tasks or processes
//! coordinate through the store alone.
//!
//! # Architecture
//!
//! - [`queue`]: FIFO, LIFO, and priority queues behind the
//!   [`FrontierQueue`] trait
//! - [`codec`]: request wire formats (MessagePack, JSON text, and a compat
//!   decoder accepting both)
//! - [`pool`]: [`PoolRegistry`] mapping aliases to live connection pools,
//!   with Redis and Postgres backends
//! - [`config`]: [`FrontierSettings`] tying the above together
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use frontier_q::{
//!     CrawlRequest, FrontierBuilder, PoolRegistry, QueueKind, RedisBackend, RedisPoolParams,
//! };
//!
//! # async fn run() -> frontier_q::Result<()> {
//! let registry = PoolRegistry::new(RedisBackend);
//! let pool = registry.create(&RedisPoolParams::default()).await?;
//!
//! let queue = FrontierBuilder::new()
//!     .kind(QueueKind::Priority)
//!     .open(pool, "books")?;
//!
//! queue
//!     .push(&CrawlRequest::new("https://example.com/").with_priority(5))
//!     .await?;
//! if let Some(request) = queue.pop(Duration::from_secs(2)).await? {
//!     println!("claimed {}", request.url);
//! }
//!
//! registry.close_all().await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod pool;
pub mod queue;
pub mod request;

// Re-export the error type
pub use error::{Error, Result};

// Re-export request and codec types
pub use codec::{CodecKind, CompatCodec, JsonCodec, MsgpackCodec, RequestCodec};
pub use request::CrawlRequest;

// Re-export queue types
pub use queue::{
    FifoQueue, FrontierBuilder, FrontierQueue, KeyTemplate, LifoQueue, PriorityQueue, QueueKind,
    DEFAULT_KEY_TEMPLATE,
};

// Re-export pool types
pub use pool::postgres::{PostgresBackend, PostgresPoolParams, PostgresRegistry};
pub use pool::redis::{RedisBackend, RedisPoolParams, RedisRegistry};
pub use pool::{ConnectionScope, PoolBackend, PoolRegistry};

// Re-export settings
pub use config::FrontierSettings;
