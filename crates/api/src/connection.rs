//! Connection pool related types.
//!
//! The pool is shared by every operation in the process and is the only
//! point of backpressure. Connections are handed out by value and must be
//! handed back through either [ConnectionPool::release] (clean exchange)
//! or [ConnectionPool::destroy] (I/O error or abandoned exchange).

use crate::*;
use std::sync::Arc;
use std::time::Duration;

/// A single connection to a storage node.
#[cfg_attr(any(test, feature = "mockall"), mockall::automock)]
pub trait Connection: 'static + Send + Sync + std::fmt::Debug {
    /// Send an encoded request.
    fn send(&self, data: bytes::Bytes) -> BoxFut<'_, BrResult<()>>;

    /// Wait for the next encoded response. This may never resolve,
    /// callers are expected to bound it with their own deadline.
    fn receive(&self) -> BoxFut<'_, BrResult<bytes::Bytes>>;
}

/// Trait-object [Connection].
pub type DynConnection = Box<dyn Connection>;

/// A pool of connections to storage nodes.
#[cfg_attr(any(test, feature = "mockall"), mockall::automock)]
pub trait ConnectionPool: 'static + Send + Sync + std::fmt::Debug {
    /// Check out a connection to the replica's node, waiting at most
    /// `timeout` for one to become available.
    fn acquire(
        &self,
        replica: ReplicaDescriptor,
        timeout: Duration,
    ) -> BoxFut<'_, BrResult<DynConnection>>;

    /// Return a connection after a clean request/response exchange.
    fn release(&self, connection: DynConnection);

    /// Return a connection that must not be reused. The pool is
    /// responsible for closing and reclaiming it.
    fn destroy(&self, connection: DynConnection);
}

/// Trait-object [ConnectionPool].
pub type DynConnectionPool = Arc<dyn ConnectionPool>;
