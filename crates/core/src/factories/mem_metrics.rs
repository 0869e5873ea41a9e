//! The in-memory metrics sink.

use blobrouter_api::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    counters: HashMap<(MetricKind, NodeId), u64>,
    latencies: Vec<(MetricKind, NodeId, Duration)>,
}

/// The in-memory metrics sink. This is NOT a production module, it is for
/// testing only.
#[derive(Debug, Default)]
pub struct MemMetrics(Mutex<Inner>);

impl MemMetrics {
    /// Construct a new MemMetrics.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The counter value for a kind and node.
    pub fn counter(&self, kind: MetricKind, node: &NodeId) -> u64 {
        self.0
            .lock()
            .expect("MemMetrics Mutex is poisoned")
            .counters
            .get(&(kind, node.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// The sum of every counter of a kind.
    pub fn total(&self, kind: MetricKind) -> u64 {
        self.0
            .lock()
            .expect("MemMetrics Mutex is poisoned")
            .counters
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, count)| *count)
            .sum()
    }

    /// The number of latency samples recorded for a kind.
    pub fn latency_samples(&self, kind: MetricKind) -> usize {
        self.0
            .lock()
            .expect("MemMetrics Mutex is poisoned")
            .latencies
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .count()
    }
}

impl Metrics for MemMetrics {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn increment_counter(&self, kind: MetricKind, node: &NodeId) {
        *self
            .0
            .lock()
            .expect("MemMetrics Mutex is poisoned")
            .counters
            .entry((kind, node.clone()))
            .or_default() += 1;
    }

    fn record_latency(
        &self,
        kind: MetricKind,
        node: &NodeId,
        latency: Duration,
    ) {
        self.0
            .lock()
            .expect("MemMetrics Mutex is poisoned")
            .latencies
            .push((kind, node.clone(), latency));
    }
}
