use blobrouter_api::*;
use std::sync::Arc;

/// A default metrics sink that records nothing.
#[derive(Debug)]
pub struct CoreMetrics;

impl CoreMetrics {
    /// Construct a new [`CoreMetrics`].
    pub fn create() -> DynMetrics {
        let out: DynMetrics = Arc::new(Self);
        out
    }
}

impl Metrics for CoreMetrics {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
