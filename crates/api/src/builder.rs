//! Builder-related types.

use crate::*;
use std::sync::Arc;

/// The general blobrouter builder.
/// This contains the configuration, the collaborator instances the router
/// calls into, and the router factory, allowing construction of a
/// runtime router instance.
#[derive(Debug)]
pub struct Builder {
    /// The module configuration to be used when building modules.
    /// This can be loaded from disk or modified before building.
    pub config: config::Config,

    /// The cluster topology service.
    pub topology: DynTopology,

    /// The shared connection pool to storage nodes.
    pub connection_pool: DynConnectionPool,

    /// The decoder for record bodies returned by storage nodes.
    pub blob_decoder: DynBlobDecoder,

    /// The metrics sink.
    pub metrics: DynMetrics,

    /// The [router::RouterFactory] to be used for creating the
    /// [router::Router] instance.
    pub router: DynRouterFactory,
}

impl Builder {
    /// Construct a default config given the configured module factories.
    pub fn with_default_config(mut self) -> BrResult<Self> {
        let Self { config, router, .. } = &mut self;

        router.default_config(config)?;

        Ok(self)
    }

    /// Validate the current configuration against the module factories.
    pub fn validate_config(&self) -> BrResult<()> {
        self.router.validate_config(&self.config)
    }

    /// Validate the configuration and generate the router instance.
    pub fn build(self) -> BoxFut<'static, BrResult<DynRouter>> {
        Box::pin(async move {
            self.validate_config()?;
            let builder = Arc::new(self);
            builder.router.create(builder.clone()).await
        })
    }
}
