//! Blobrouter error types.

use crate::NodeId;
use std::sync::Arc;

/// A shareable source error.
///
/// Wraps the error in an `Arc` so that [BrError] stays `Clone` even when
/// the source error is not.
#[derive(Clone, Default)]
pub struct DynInnerError(
    pub Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
);

impl DynInnerError {
    /// Wrap a source error.
    pub fn new<E: std::error::Error + 'static + Send + Sync>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }
}

impl std::fmt::Debug for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            None => f.write_str("None"),
            Some(src) => write!(f, "{src:?}"),
        }
    }
}

impl std::fmt::Display for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            None => f.write_str("None"),
            Some(src) => src.fmt(f),
        }
    }
}

impl std::error::Error for DynInnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.0 {
            None => None,
            Some(src) => Some(&**src),
        }
    }
}

/// The error type returned by blobrouter collaborators (topology,
/// connection pool, record decoder) and by configuration handling.
///
/// Replica-level failures never escape as this type. They are classified
/// into a [crate::ReplicaErrorKind] by the replica request, and the
/// coordinator reports a [crate::CoordinatorError] to its caller.
///
/// Clonable so a result can be handed to more than one task.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrError {
    /// A storage node could not be reached, or the exchange with it broke
    /// off.
    #[error("connection to {node} failed: {ctx}")]
    Connection {
        /// The node.
        node: NodeId,

        /// What went wrong.
        ctx: Arc<str>,
    },

    /// Bytes could not be decoded into the expected message or record.
    #[error("could not decode {what} (src: {src})")]
    Decode {
        /// What was being decoded.
        what: Arc<str>,

        /// The decoder error (if any).
        #[source]
        src: DynInnerError,
    },

    /// A module configuration is missing, malformed or out of range.
    #[error("invalid config: {ctx}")]
    InvalidConfig {
        /// What is wrong with it.
        ctx: Arc<str>,
    },

    /// Any other failure.
    #[error("{ctx} (src: {src})")]
    Other {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },
}

impl BrError {
    /// Construct a [BrError::Connection] error.
    pub fn connection<C: std::fmt::Display>(node: &NodeId, ctx: C) -> Self {
        Self::Connection {
            node: node.clone(),
            ctx: ctx.to_string().into(),
        }
    }

    /// Construct a [BrError::Decode] error with the decoder's error.
    pub fn decode<S: std::error::Error + 'static + Send + Sync>(
        what: &str,
        src: S,
    ) -> Self {
        Self::Decode {
            what: what.into(),
            src: DynInnerError::new(src),
        }
    }

    /// Construct a [BrError::Decode] error for input that is well-formed
    /// for the decoder but not acceptable.
    pub fn invalid<C: std::fmt::Display>(what: &str, ctx: C) -> Self {
        Self::Decode {
            what: what.into(),
            src: DynInnerError::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                ctx.to_string(),
            )),
        }
    }

    /// Construct a [BrError::InvalidConfig] error.
    pub fn invalid_config<C: std::fmt::Display>(ctx: C) -> Self {
        Self::InvalidConfig {
            ctx: ctx.to_string().into(),
        }
    }

    /// Construct an "other" error with an inner source error.
    pub fn other_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        ctx: C,
        src: S,
    ) -> Self {
        Self::Other {
            ctx: ctx.to_string().into(),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error.
    pub fn other<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Other {
            ctx: ctx.to_string().into(),
            src: DynInnerError::default(),
        }
    }
}

/// The blobrouter collaborator result type.
pub type BrResult<T> = Result<T, BrError>;
