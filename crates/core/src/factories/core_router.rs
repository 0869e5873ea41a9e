//! CoreRouter is the blobrouter module that reads blobs from the replicas
//! holding them.
//!
//! Every read is an [Operation]: a coordinator that races requests to
//! replicas under a single deadline and resolves exactly once.
//!
//! ### Operation
//!
//! - Asks the topology for the ordered replica set of the blob. Replicas in
//!   the local datacenter are queued before remote ones.
//! - Keeps at most `parallel_request_count` replica requests in flight.
//!   Whenever a request reports its outcome and the operation is still
//!   unresolved, the next queued replica is dispatched.
//! - Counts replicas found unreachable. Once that count reaches
//!   `remote_admission_down_percent` of the local replica count, remote
//!   replicas are dispatched ahead of the remaining local ones, so that an
//!   unavailable datacenter does not have to time out replica by replica.
//! - The first successful outcome resolves the operation. Otherwise the
//!   operation resolves once every replica has answered, or at the deadline,
//!   to a single classification. It only reports that the blob is absent if
//!   every replica affirmatively said so.
//! - Outcomes arriving after resolution are drained and logged, never
//!   applied.
//!
//! ### Replica requests
//!
//! Each replica request runs as its own task. It acquires a connection from
//! the shared pool, sends the encoded get request, waits for the response
//! until the operation deadline and decodes it. Whatever happens, it records
//! metrics, hands the connection back and reports exactly one outcome to the
//! operation's response collector.

use blobrouter_api::{builder, config::Config, *};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

mod collector;
mod get;
mod operation;
mod policy;
mod replica_request;

pub use get::*;
pub use operation::*;

/// CoreRouter configuration types.
pub mod config {
    /// Configuration parameters for [CoreRouterFactory](super::CoreRouterFactory).
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct CoreRouterConfig {
        /// How many replica requests of one operation can be in flight
        /// at once. Default: 2.
        pub parallel_request_count: u8,
        /// Time from the start of an operation to its deadline.
        /// Default: 10 s.
        pub operation_timeout_ms: u32,
        /// Percentage of the local replica count that must be found
        /// unreachable before remote replicas are dispatched ahead of the
        /// remaining local ones. Default: 50.
        pub remote_admission_down_percent: u8,
        /// Client id sent to storage nodes. Default: "blobrouter".
        pub client_id: String,
    }

    impl Default for CoreRouterConfig {
        fn default() -> Self {
            Self {
                parallel_request_count: 2,
                operation_timeout_ms: 10_000,
                remote_admission_down_percent: 50,
                client_id: "blobrouter".to_string(),
            }
        }
    }

    impl CoreRouterConfig {
        /// The operation timeout as a duration.
        pub fn operation_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.operation_timeout_ms as u64)
        }
    }

    /// Module-level configuration for CoreRouter.
    #[derive(
        Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize,
    )]
    #[serde(rename_all = "camelCase", default)]
    pub struct CoreRouterModConfig {
        /// CoreRouter configuration.
        pub core_router: CoreRouterConfig,
    }

    impl blobrouter_api::config::ModConfig for CoreRouterModConfig {}
}

use config::*;

/// A production-ready router module.
#[derive(Debug)]
pub struct CoreRouterFactory {}

impl CoreRouterFactory {
    /// Construct a new CoreRouterFactory.
    pub fn create() -> DynRouterFactory {
        Arc::new(Self {})
    }
}

impl RouterFactory for CoreRouterFactory {
    fn default_config(&self, config: &mut Config) -> BrResult<()> {
        config.set_default_module_config(&CoreRouterModConfig::default())?;
        Ok(())
    }

    fn validate_config(&self, config: &Config) -> BrResult<()> {
        let config: CoreRouterModConfig = config.get_module_config()?;
        if config.core_router.parallel_request_count == 0 {
            return Err(BrError::invalid_config(
                "coreRouter.parallelRequestCount must be at least 1",
            ));
        }
        if config.core_router.operation_timeout_ms == 0 {
            return Err(BrError::invalid_config(
                "coreRouter.operationTimeoutMs must be at least 1",
            ));
        }
        if config.core_router.remote_admission_down_percent > 100 {
            return Err(BrError::invalid_config(format!(
                "coreRouter.remoteAdmissionDownPercent must be at most 100, got {}",
                config.core_router.remote_admission_down_percent
            )));
        }
        Ok(())
    }

    fn create(
        &self,
        builder: Arc<builder::Builder>,
    ) -> BoxFut<'static, BrResult<DynRouter>> {
        Box::pin(async move {
            let config: CoreRouterModConfig =
                builder.config.get_module_config()?;
            let out: DynRouter = Arc::new(CoreRouter::new(
                config.core_router,
                builder.topology.clone(),
                builder.connection_pool.clone(),
                builder.blob_decoder.clone(),
                builder.metrics.clone(),
            ));
            Ok(out)
        })
    }
}

/// The router produced by [CoreRouterFactory].
#[derive(Debug)]
pub struct CoreRouter {
    config: CoreRouterConfig,
    topology: DynTopology,
    connection_pool: DynConnectionPool,
    blob_decoder: DynBlobDecoder,
    metrics: DynMetrics,
    next_correlation_id: AtomicU64,
}

impl CoreRouter {
    /// Construct a new router from its collaborators.
    pub fn new(
        config: CoreRouterConfig,
        topology: DynTopology,
        connection_pool: DynConnectionPool,
        blob_decoder: DynBlobDecoder,
        metrics: DynMetrics,
    ) -> Self {
        Self {
            config,
            topology,
            connection_pool,
            blob_decoder,
            metrics,
            next_correlation_id: AtomicU64::new(1),
        }
    }

    /// Build the context for a new operation. The deadline is fixed here.
    fn new_context(&self) -> Arc<OperationContext> {
        Arc::new(OperationContext::new(
            self.next_correlation_id.fetch_add(1, Ordering::Relaxed),
            self.config.client_id.as_str().into(),
            self.config.operation_timeout(),
            self.topology.clone(),
            self.metrics.clone(),
        ))
    }

    /// Run a complete operation of the given kind.
    pub async fn run<K: OperationKind>(
        &self,
        blob_id: BlobId,
    ) -> Result<K::Output, CoordinatorError> {
        let mut operation = Operation::<K>::new(
            self.new_context(),
            blob_id,
            self.connection_pool.clone(),
            self.blob_decoder.clone(),
            &self.config,
        );
        operation.start()?;
        operation.await_result().await?;
        operation.payload()
    }
}

impl Router for CoreRouter {
    fn get_blob(
        &self,
        blob_id: BlobId,
    ) -> BoxFut<'_, Result<BlobOutput, CoordinatorError>> {
        Box::pin(self.run::<GetBlob>(blob_id))
    }

    fn get_blob_properties(
        &self,
        blob_id: BlobId,
    ) -> BoxFut<'_, Result<BlobProperties, CoordinatorError>> {
        Box::pin(self.run::<GetBlobProperties>(blob_id))
    }

    fn get_blob_user_metadata(
        &self,
        blob_id: BlobId,
    ) -> BoxFut<'_, Result<bytes::Bytes, CoordinatorError>> {
        Box::pin(self.run::<GetBlobUserMetadata>(blob_id))
    }
}
