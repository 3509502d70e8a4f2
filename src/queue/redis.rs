//! Redis-backed queue variants.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::codec::RequestCodec;
use crate::error::{Error, Result};
use crate::queue::FrontierQueue;
use crate::request::CrawlRequest;

/// Score placed on a sorted-set member so that higher priorities pop first.
pub(crate) fn priority_score(priority: i32) -> f64 {
    -f64::from(priority)
}

/// Blocking commands read a zero timeout as "wait forever", so a positive
/// wait is floored to the server's millisecond resolution instead.
fn blocking_secs(timeout: Duration) -> f64 {
    timeout.as_secs_f64().max(0.001)
}

/// State shared by all variants: the pool, the rendered key, and the codec.
struct RedisQueueCore {
    pool: Pool,
    key: String,
    codec: Arc<dyn RequestCodec>,
}

impl RedisQueueCore {
    fn new(pool: Pool, key: String, codec: Arc<dyn RequestCodec>) -> Self {
        Self { pool, key, codec }
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::Store(format!("failed to get redis connection: {}", e)))
    }

    async fn list_len(&self) -> Result<u64> {
        let mut conn = self.conn().await?;
        let len: u64 = conn.llen(&self.key).await?;
        Ok(len)
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(&self.key).await?;
        debug!(key = %self.key, "queue cleared");
        Ok(())
    }

    fn decode(&self, payload: Option<Vec<u8>>) -> Result<Option<CrawlRequest>> {
        match payload {
            Some(payload) => match self.codec.decode(&payload) {
                Ok(request) => {
                    debug!(key = %self.key, url = %request.url, "request claimed");
                    Ok(Some(request))
                }
                // The member is already removed from the store at this point,
                // so the caller must know the claim was lost.
                Err(err) => {
                    warn!(key = %self.key, error = %err, "claimed payload failed to decode");
                    Err(err)
                }
            },
            None => Ok(None),
        }
    }
}

/// First in, first out: `LPUSH` on one end, `RPOP` from the other.
pub struct FifoQueue {
    inner: RedisQueueCore,
}

impl FifoQueue {
    pub fn new(pool: Pool, key: String, codec: Arc<dyn RequestCodec>) -> Self {
        Self {
            inner: RedisQueueCore::new(pool, key, codec),
        }
    }
}

#[async_trait]
impl FrontierQueue for FifoQueue {
    async fn len(&self) -> Result<u64> {
        self.inner.list_len().await
    }

    async fn push(&self, request: &CrawlRequest) -> Result<()> {
        let payload = self.inner.codec.encode(request)?;
        let mut conn = self.inner.conn().await?;
        let _: () = conn.lpush(&self.inner.key, payload.as_slice()).await?;
        debug!(key = %self.inner.key, url = %request.url, "request pushed");
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<CrawlRequest>> {
        let mut conn = self.inner.conn().await?;
        let payload: Option<Vec<u8>> = if timeout.is_zero() {
            conn.rpop(&self.inner.key, None).await?
        } else {
            let reply: Option<(String, Vec<u8>)> =
                conn.brpop(&self.inner.key, blocking_secs(timeout)).await?;
            reply.map(|(_, payload)| payload)
        };
        self.inner.decode(payload)
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }

    fn key(&self) -> &str {
        &self.inner.key
    }
}

/// Last in, first out: `LPUSH` and `LPOP` work the same end of the list.
pub struct LifoQueue {
    inner: RedisQueueCore,
}

impl LifoQueue {
    pub fn new(pool: Pool, key: String, codec: Arc<dyn RequestCodec>) -> Self {
        Self {
            inner: RedisQueueCore::new(pool, key, codec),
        }
    }
}

#[async_trait]
impl FrontierQueue for LifoQueue {
    async fn len(&self) -> Result<u64> {
        self.inner.list_len().await
    }

    async fn push(&self, request: &CrawlRequest) -> Result<()> {
        let payload = self.inner.codec.encode(request)?;
        let mut conn = self.inner.conn().await?;
        let _: () = conn.lpush(&self.inner.key, payload.as_slice()).await?;
        debug!(key = %self.inner.key, url = %request.url, "request pushed");
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<CrawlRequest>> {
        let mut conn = self.inner.conn().await?;
        let payload: Option<Vec<u8>> = if timeout.is_zero() {
            conn.lpop(&self.inner.key, None).await?
        } else {
            let reply: Option<(String, Vec<u8>)> =
                conn.blpop(&self.inner.key, blocking_secs(timeout)).await?;
            reply.map(|(_, payload)| payload)
        };
        self.inner.decode(payload)
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }

    fn key(&self) -> &str {
        &self.inner.key
    }
}

/// Priority queue over a sorted set.
///
/// Members are scored with the negated request priority, so the lowest score
/// is the most urgent request. Claiming uses the store's atomic lowest-score
/// pop (`ZPOPMIN`, or `BZPOPMIN` when waiting): read and removal happen in
/// one indivisible step, so concurrent consumers never receive the same
/// member twice.
///
/// Two properties of sorted sets are worth knowing:
///
/// - Equal scores are ordered by the lexicographic byte order of the encoded
///   member, not by insertion time. Ties between equal priorities therefore
///   pop in an arbitrary but stable order.
/// - Pushing a byte-identical payload twice stores one member. Distinct
///   requests always differ in at least one field, so this only affects true
///   duplicates, whose suppression is the caller's business anyway.
pub struct PriorityQueue {
    inner: RedisQueueCore,
}

impl PriorityQueue {
    pub fn new(pool: Pool, key: String, codec: Arc<dyn RequestCodec>) -> Self {
        Self {
            inner: RedisQueueCore::new(pool, key, codec),
        }
    }
}

#[async_trait]
impl FrontierQueue for PriorityQueue {
    async fn len(&self) -> Result<u64> {
        let mut conn = self.inner.conn().await?;
        let len: u64 = conn.zcard(&self.inner.key).await?;
        Ok(len)
    }

    async fn push(&self, request: &CrawlRequest) -> Result<()> {
        let payload = self.inner.codec.encode(request)?;
        let score = priority_score(request.priority);
        let mut conn = self.inner.conn().await?;
        let _: () = conn.zadd(&self.inner.key, payload.as_slice(), score).await?;
        debug!(
            key = %self.inner.key,
            url = %request.url,
            priority = request.priority,
            score = %score,
            "request pushed"
        );
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<CrawlRequest>> {
        let mut conn = self.inner.conn().await?;
        let payload: Option<Vec<u8>> = if timeout.is_zero() {
            let popped: Vec<(Vec<u8>, f64)> = conn.zpopmin(&self.inner.key, 1).await?;
            popped.into_iter().next().map(|(member, _)| member)
        } else {
            let reply: Option<(String, Vec<u8>, f64)> =
                conn.bzpopmin(&self.inner.key, blocking_secs(timeout)).await?;
            reply.map(|(_, member, _)| member)
        };
        self.inner.decode(payload)
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }

    fn key(&self) -> &str {
        &self.inner.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecKind;
    use crate::queue::{FrontierBuilder, QueueKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    // These tests exercise a real server on redis://127.0.0.1:6379, database
    // 15, and are ignored by default. Run them with `cargo test -- --ignored`.

    static OWNER_SEQ: AtomicU32 = AtomicU32::new(0);

    fn test_pool() -> Pool {
        deadpool_redis::Config::from_url("redis://127.0.0.1:6379/15")
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .expect("test pool config")
    }

    fn unique_owner(tag: &str) -> String {
        format!(
            "t{}-{}-{}",
            std::process::id(),
            tag,
            OWNER_SEQ.fetch_add(1, Ordering::Relaxed)
        )
    }

    fn open(kind: QueueKind, tag: &str) -> Box<dyn FrontierQueue> {
        FrontierBuilder::new()
            .kind(kind)
            .codec(CodecKind::Msgpack)
            .open(test_pool(), &unique_owner(tag))
            .expect("open test queue")
    }

    async fn drain(queue: &dyn FrontierQueue) -> Vec<String> {
        let mut urls = Vec::new();
        while let Some(request) = queue.pop(Duration::ZERO).await.expect("pop") {
            urls.push(request.url);
        }
        urls
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on 127.0.0.1:6379"]
    async fn fifo_pops_in_insertion_order() {
        let queue = open(QueueKind::Fifo, "fifo");
        for url in ["http://a/", "http://b/", "http://c/"] {
            queue.push(&CrawlRequest::new(url)).await.unwrap();
        }
        assert_eq!(queue.len().await.unwrap(), 3);
        assert_eq!(drain(queue.as_ref()).await, ["http://a/", "http://b/", "http://c/"]);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on 127.0.0.1:6379"]
    async fn lifo_pops_most_recent_first() {
        let queue = open(QueueKind::Lifo, "lifo");
        for url in ["http://a/", "http://b/", "http://c/"] {
            queue.push(&CrawlRequest::new(url)).await.unwrap();
        }
        assert_eq!(drain(queue.as_ref()).await, ["http://c/", "http://b/", "http://a/"]);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on 127.0.0.1:6379"]
    async fn priority_pops_highest_priority_first() {
        let queue = open(QueueKind::Priority, "prio");
        queue.push(&CrawlRequest::new("http://a/").with_priority(1)).await.unwrap();
        queue.push(&CrawlRequest::new("http://b/").with_priority(10)).await.unwrap();
        queue.push(&CrawlRequest::new("http://c/").with_priority(5)).await.unwrap();
        assert_eq!(drain(queue.as_ref()).await, ["http://b/", "http://c/", "http://a/"]);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on 127.0.0.1:6379"]
    async fn pop_zero_on_empty_returns_immediately() {
        let queue = open(QueueKind::Fifo, "empty");
        let started = Instant::now();
        assert!(queue.pop(Duration::ZERO).await.unwrap().is_none());
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on 127.0.0.1:6379"]
    async fn blocking_pop_returns_none_on_expiry() {
        let queue = open(QueueKind::Priority, "expiry");
        let started = Instant::now();
        let popped = queue.pop(Duration::from_secs(1)).await.unwrap();
        assert!(popped.is_none());
        assert!(started.elapsed() >= Duration::from_millis(900));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on 127.0.0.1:6379"]
    async fn blocking_pop_wakes_on_push() {
        let owner = unique_owner("wake");
        let builder = FrontierBuilder::new().kind(QueueKind::Fifo).codec(CodecKind::Msgpack);
        let consumer = builder.open(test_pool(), &owner).unwrap();
        let producer = builder.open(test_pool(), &owner).unwrap();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            producer.push(&CrawlRequest::new("http://late/")).await.unwrap();
        });

        let started = Instant::now();
        let popped = consumer.pop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(popped.map(|r| r.url).as_deref(), Some("http://late/"));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on 127.0.0.1:6379"]
    async fn priority_delivers_each_item_exactly_once() {
        let owner = unique_owner("claims");
        let builder = FrontierBuilder::new().kind(QueueKind::Priority).codec(CodecKind::Msgpack);
        let pool = test_pool();

        let producer = builder.open(pool.clone(), &owner).unwrap();
        let total = 40;
        for i in 0..total {
            let request = CrawlRequest::new(format!("https://example.com/item/{}", i))
                .with_priority(i % 7);
            producer.push(&request).await.unwrap();
        }
        assert_eq!(producer.len().await.unwrap(), total as u64);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = builder.open(pool.clone(), &owner).unwrap();
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(request) = queue.pop(Duration::ZERO).await.unwrap() {
                    claimed.push(request.url);
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        let mut expected: Vec<String> =
            (0..total).map(|i| format!("https://example.com/item/{}", i)).collect();
        expected.sort();
        all.sort();
        assert_eq!(all, expected, "every item claimed exactly once");
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on 127.0.0.1:6379"]
    async fn clear_empties_and_is_idempotent() {
        let queue = open(QueueKind::Priority, "clear");
        queue.push(&CrawlRequest::new("http://a/")).await.unwrap();
        queue.push(&CrawlRequest::new("http://b/")).await.unwrap();
        queue.clear().await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 0);
        queue.clear().await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on 127.0.0.1:6379"]
    async fn equal_priorities_pop_in_member_byte_order() {
        let queue = open(QueueKind::Priority, "ties");
        // Insertion order b, a; byte order of the encoded members is a, b.
        queue.push(&CrawlRequest::new("http://b/")).await.unwrap();
        queue.push(&CrawlRequest::new("http://a/")).await.unwrap();
        assert_eq!(drain(queue.as_ref()).await, ["http://a/", "http://b/"]);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on 127.0.0.1:6379"]
    async fn identical_payloads_collapse_in_priority_queue() {
        let queue = open(QueueKind::Priority, "dedup");
        let request = CrawlRequest::new("http://same/");
        queue.push(&request).await.unwrap();
        queue.push(&request).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[test]
    fn priority_score_is_negated_priority() {
        assert_eq!(priority_score(10), -10.0);
        assert_eq!(priority_score(0), 0.0);
        assert_eq!(priority_score(-3), 3.0);
        // Higher priority sorts lower, so ZPOPMIN serves it first.
        assert!(priority_score(10) < priority_score(5));
        assert!(priority_score(5) < priority_score(1));
    }
}
