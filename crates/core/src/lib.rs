#![deny(missing_docs)]
//! Blobrouter replicated blob reads.

use blobrouter_api::{builder::Builder, config::Config, *};

/// Construct a production-ready default builder around the deployment's
/// topology and connection pool.
///
/// - `blob_decoder` - The default decoder is [factories::RecordBlobDecoder].
/// - `metrics` - The default sink is the no-op [factories::CoreMetrics].
/// - `router` - The default router is [factories::CoreRouterFactory].
pub fn default_builder(
    topology: DynTopology,
    connection_pool: DynConnectionPool,
) -> Builder {
    Builder {
        config: Config::default(),
        topology,
        connection_pool,
        blob_decoder: factories::RecordBlobDecoder::create(),
        metrics: factories::CoreMetrics::create(),
        router: factories::CoreRouterFactory::create(),
    }
}

/// Construct a builder wired to in-memory collaborators, for testing.
///
/// Returns the builder along with the [factories::MemTopology],
/// [factories::MemConnectionPool] and [factories::MemMetrics] it uses,
/// so tests can script replicas and inspect what happened.
pub fn default_test_builder(
    local_datacenter: &str,
    replicas: Vec<ReplicaDescriptor>,
) -> (
    Builder,
    std::sync::Arc<factories::MemTopology>,
    std::sync::Arc<factories::MemConnectionPool>,
    std::sync::Arc<factories::MemMetrics>,
) {
    let topology = factories::MemTopology::create(local_datacenter, replicas);
    let pool = factories::MemConnectionPool::create();
    let metrics = factories::MemMetrics::create();
    let builder = Builder {
        config: Config::default(),
        topology: topology.clone(),
        connection_pool: pool.clone(),
        blob_decoder: factories::RecordBlobDecoder::create(),
        metrics: metrics.clone(),
        router: factories::CoreRouterFactory::create(),
    };
    (builder, topology, pool, metrics)
}

pub mod factories;
