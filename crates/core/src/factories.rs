//! Factories for generating instances of blobrouter modules.

pub mod core_router;
pub use core_router::CoreRouterFactory;

mod core_metrics;
pub use core_metrics::*;

mod record_decoder;
pub use record_decoder::*;

pub mod mem_topology;
pub use mem_topology::MemTopology;

pub mod mem_connection_pool;
pub use mem_connection_pool::MemConnectionPool;

pub mod mem_metrics;
pub use mem_metrics::MemMetrics;
