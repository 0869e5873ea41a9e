//! Blobrouter router types.

use crate::*;
use std::sync::Arc;

/// Reads blobs from the replicas that hold them.
///
/// Every call is an independent operation with its own deadline. A call
/// that fails with a retriable [CoordinatorError] may be retried by
/// calling again.
pub trait Router: 'static + Send + Sync + std::fmt::Debug {
    /// Get the content of a blob.
    fn get_blob(
        &self,
        blob_id: BlobId,
    ) -> BoxFut<'_, Result<BlobOutput, CoordinatorError>>;

    /// Get the properties of a blob.
    fn get_blob_properties(
        &self,
        blob_id: BlobId,
    ) -> BoxFut<'_, Result<BlobProperties, CoordinatorError>>;

    /// Get the user metadata of a blob.
    fn get_blob_user_metadata(
        &self,
        blob_id: BlobId,
    ) -> BoxFut<'_, Result<bytes::Bytes, CoordinatorError>>;
}

/// Trait object [Router].
pub type DynRouter = Arc<dyn Router>;

/// A factory for creating Router instances.
pub trait RouterFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &mut config::Config) -> BrResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &config::Config) -> BrResult<()>;

    /// Construct a Router instance.
    fn create(
        &self,
        builder: Arc<builder::Builder>,
    ) -> BoxFut<'static, BrResult<DynRouter>>;
}

/// Trait object [RouterFactory].
pub type DynRouterFactory = Arc<dyn RouterFactory>;
