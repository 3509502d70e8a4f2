//! The distributed request queue shared by cooperating workers.
//!
//! A queue is addressed by a key rendered from a template and an owner name,
//! lives entirely in the backing store, and is consumed concurrently by any
//! number of tasks and processes. Three ordering disciplines are available:
//!
//! - [`QueueKind::Fifo`]: requests come back in insertion order
//! - [`QueueKind::Lifo`]: the most recently pushed request comes back first
//! - [`QueueKind::Priority`]: higher-priority requests come back first
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use frontier_q::{CrawlRequest, FrontierBuilder, QueueKind};
//!
//! # async fn run(pool: deadpool_redis::Pool) -> frontier_q::Result<()> {
//! let queue = FrontierBuilder::new()
//!     .kind(QueueKind::Priority)
//!     .open(pool, "books")?;
//!
//! queue.push(&CrawlRequest::new("https://example.com/").with_priority(5)).await?;
//! while let Some(request) = queue.pop(Duration::from_secs(2)).await? {
//!     println!("claimed {}", request.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::codec::CodecKind;
use crate::error::{Error, Result};
use crate::request::CrawlRequest;

pub use redis::{FifoQueue, LifoQueue, PriorityQueue};

/// Default key template; `{name}` is replaced by the queue owner's name.
pub const DEFAULT_KEY_TEMPLATE: &str = "{name}:requests";

const OWNER_PLACEHOLDER: &str = "{name}";

/// One logical request queue in the backing store.
///
/// Implementations never retry on their own: a store failure surfaces as
/// [`Error::Store`] and the caller decides whether to try again.
#[async_trait]
pub trait FrontierQueue: Send + Sync {
    /// Number of requests currently waiting under this key.
    async fn len(&self) -> Result<u64>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Encode and insert one request. Does not block on a full queue; the
    /// backing store has no bounded-capacity notion here.
    async fn push(&self, request: &CrawlRequest) -> Result<()>;

    /// Take one request off the queue.
    ///
    /// A zero timeout makes exactly one non-blocking attempt and returns
    /// `None` immediately when nothing is waiting. A positive timeout waits
    /// in the store for up to that long before returning `None`. Waiting
    /// suspends only the calling task. A timed-out wait consumes nothing.
    async fn pop(&self, timeout: Duration) -> Result<Option<CrawlRequest>>;

    /// Drop every request under this key. Idempotent on an empty queue.
    async fn clear(&self) -> Result<()>;

    /// The rendered store key this queue operates on.
    fn key(&self) -> &str;
}

/// Ordering discipline, as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Fifo,
    Lifo,
    #[default]
    Priority,
}

/// Validated key template holding a `{name}` placeholder.
///
/// Rendering is pure: the same owner name always yields the same key.
#[derive(Debug, Clone)]
pub struct KeyTemplate {
    template: String,
}

impl KeyTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(OWNER_PLACEHOLDER) {
            return Err(Error::Configuration(format!(
                "key template '{}' has no '{}' placeholder",
                template, OWNER_PLACEHOLDER
            )));
        }
        Ok(Self { template })
    }

    /// Substitute the owner name into the template.
    pub fn render(&self, owner: &str) -> Result<String> {
        if owner.trim().is_empty() {
            return Err(Error::Configuration("queue owner name is empty".to_string()));
        }
        Ok(self.template.replace(OWNER_PLACEHOLDER, owner))
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Default for KeyTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_KEY_TEMPLATE.to_string(),
        }
    }
}

/// Builder assembling queues from configuration.
///
/// One builder can open any number of queues; each `open` renders the key for
/// one owner and hands back an independent queue handle over the given pool.
#[derive(Debug, Clone)]
pub struct FrontierBuilder {
    kind: QueueKind,
    template: String,
    codec: CodecKind,
}

impl FrontierBuilder {
    pub fn new() -> Self {
        Self {
            kind: QueueKind::default(),
            template: DEFAULT_KEY_TEMPLATE.to_string(),
            codec: CodecKind::default(),
        }
    }

    /// Set the ordering discipline.
    pub fn kind(mut self, kind: QueueKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the key template. Must contain the `{name}` placeholder.
    pub fn key_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Set the wire codec.
    pub fn codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    /// Open the queue owned by `owner` over the given Redis pool.
    ///
    /// Validates the template and owner name; nothing is written to the store
    /// until the queue is first used.
    pub fn open(&self, pool: deadpool_redis::Pool, owner: &str) -> Result<Box<dyn FrontierQueue>> {
        let key = KeyTemplate::new(&self.template)?.render(owner)?;
        let codec = self.codec.build();
        Ok(match self.kind {
            QueueKind::Fifo => Box::new(FifoQueue::new(pool, key, codec)),
            QueueKind::Lifo => Box::new(LifoQueue::new(pool, key, codec)),
            QueueKind::Priority => Box::new(PriorityQueue::new(pool, key, codec)),
        })
    }
}

impl Default for FrontierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_renders_owner_into_key() {
        let template = KeyTemplate::new("{name}:requests").unwrap();
        assert_eq!(template.render("books").unwrap(), "books:requests");
        // Same owner, same key.
        assert_eq!(template.render("books").unwrap(), "books:requests");
        assert_eq!(template.render("news").unwrap(), "news:requests");
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let err = KeyTemplate::new("requests").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "got {:?}", err);
    }

    #[test]
    fn empty_owner_is_rejected() {
        let template = KeyTemplate::default();
        assert!(template.render("").is_err());
        assert!(template.render("   ").is_err());
    }

    #[test]
    fn default_template_matches_convention() {
        assert_eq!(KeyTemplate::default().as_str(), "{name}:requests");
    }

    #[test]
    fn queue_kind_parses_config_strings() {
        assert_eq!(serde_json::from_str::<QueueKind>("\"fifo\"").unwrap(), QueueKind::Fifo);
        assert_eq!(serde_json::from_str::<QueueKind>("\"lifo\"").unwrap(), QueueKind::Lifo);
        assert_eq!(
            serde_json::from_str::<QueueKind>("\"priority\"").unwrap(),
            QueueKind::Priority
        );
        assert_eq!(QueueKind::default(), QueueKind::Priority);
    }

    #[test]
    fn open_validates_before_touching_the_store() {
        // Pool construction is lazy, no server is contacted here.
        let pool = deadpool_redis::Config::from_url("redis://127.0.0.1:6379/15")
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .unwrap();

        let err = FrontierBuilder::new()
            .key_template("no-placeholder")
            .open(pool.clone(), "books")
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration(_)), "got {:?}", err);

        let err = FrontierBuilder::new().open(pool.clone(), "").err().unwrap();
        assert!(matches!(err, Error::Configuration(_)), "got {:?}", err);

        let queue = FrontierBuilder::new().kind(QueueKind::Fifo).open(pool, "books").unwrap();
        assert_eq!(queue.key(), "books:requests");
    }
}
