#![deny(missing_docs)]
//! Blobrouter API contains the collaborator traits and the basic types
//! required to coordinate replicated blob reads.
//!
//! The coordinator itself lives in the blobrouter_core crate.

/// Boxed future type.
pub type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

pub mod builder;
pub mod config;

mod error;
pub use error::*;

pub mod id;
pub use id::{BlobId, NodeId};

pub mod topology;
pub use topology::*;

pub mod connection;
pub use connection::*;

pub mod protocol;
pub use protocol::*;

pub mod format;
pub use format::*;

pub mod metrics;
pub use metrics::*;

pub mod operation;
pub use operation::*;

pub mod router;
pub use router::*;
