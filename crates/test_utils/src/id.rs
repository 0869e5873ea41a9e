//! Test utilities associated with ids.

use crate::random_bytes;
use blobrouter_api::{BlobId, NodeId, ReplicaDescriptor};
use bytes::Bytes;

/// Create a random blob id in account 1, container 1, partition 0.
pub fn random_blob_id() -> BlobId {
    BlobId::new(1, 1, 0, Bytes::from(random_bytes(16)))
        .expect("a 16 byte unique part is always valid")
}

/// Create replica descriptors for `count` nodes named
/// `{prefix}-0:6667 .. {prefix}-(count-1):6667` in `datacenter`.
pub fn replicas_in(
    datacenter: &str,
    prefix: &str,
    count: usize,
) -> Vec<ReplicaDescriptor> {
    (0..count)
        .map(|i| {
            ReplicaDescriptor::new(
                NodeId::new(&format!("{prefix}-{i}"), 6667),
                datacenter,
            )
        })
        .collect()
}
