use std::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::pool::PoolBackend;

/// A pooled connection bound to a lexical scope.
///
/// The connection goes back to its pool when the scope drops, which happens
/// on every exit path: normal return, early `?`, or panic unwind. Callers
/// never release by hand.
pub struct ConnectionScope<B: PoolBackend> {
    conn: B::Connection,
}

impl<B: PoolBackend> ConnectionScope<B> {
    /// Borrow a connection from `pool`, optionally pinging it first.
    ///
    /// When the ping fails the connection is returned to the pool before the
    /// error surfaces, so an unhealthy connection is never left checked out.
    pub async fn acquire(backend: &B, pool: &B::Pool, health_check: bool) -> Result<Self> {
        let mut conn = backend.acquire(pool).await?;
        if health_check {
            if let Err(err) = backend.ping(&mut conn).await {
                drop(conn);
                return Err(err);
            }
        }
        Ok(Self { conn })
    }

    /// Mutable access to the underlying connection.
    pub fn connection(&mut self) -> &mut B::Connection {
        &mut self.conn
    }

    /// Detach the connection from the scope. The caller takes over the
    /// return-to-pool obligation, which the connection type discharges on
    /// drop.
    pub fn into_inner(self) -> B::Connection {
        self.conn
    }
}

impl<B: PoolBackend> Deref for ConnectionScope<B> {
    type Target = B::Connection;

    fn deref(&self) -> &B::Connection {
        &self.conn
    }
}

impl<B: PoolBackend> DerefMut for ConnectionScope<B> {
    fn deref_mut(&mut self) -> &mut B::Connection {
        &mut self.conn
    }
}
