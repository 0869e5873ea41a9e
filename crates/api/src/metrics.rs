//! Blobrouter metrics types.

use crate::*;
use std::sync::Arc;
use std::time::Duration;

/// The kind of request a metric sample is recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    /// A get request for blob content.
    GetBlobRequest,
    /// A get request for blob properties.
    GetBlobPropertiesRequest,
    /// A get request for blob user metadata.
    GetBlobUserMetadataRequest,
}

/// Sink for per-replica request metrics.
///
/// Recording is fire-and-forget. Implementations must not block and have
/// no way to fail the operation that records.
pub trait Metrics: 'static + Send + Sync + std::fmt::Debug {
    /// To aid in concrete downcasting.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Count a request sent to a node.
    fn increment_counter(&self, _kind: MetricKind, _node: &NodeId) {
        // provided impl is a no-op
    }

    /// Record how long a request to a node took, whatever its outcome.
    fn record_latency(
        &self,
        _kind: MetricKind,
        _node: &NodeId,
        _latency: Duration,
    ) {
        // provided impl is a no-op
    }
}

/// Trait object [Metrics].
pub type DynMetrics = Arc<dyn Metrics>;
