//! Cluster topology related types.
//!
//! Replica placement is owned by the topology. The coordinator only reads
//! the descriptors it is handed, and feeds back up/down hints it observes
//! while talking to replicas.

use crate::*;
use std::sync::Arc;

/// Health hint for a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicaState {
    /// The replica is believed to be reachable.
    Up,

    /// The replica is believed to be unreachable.
    Down,
}

/// A replica of a blob's partition, as described by the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaDescriptor {
    /// The storage node holding the replica.
    pub node: NodeId,

    /// The datacenter the node lives in.
    pub datacenter: Arc<str>,

    /// The topology's current health hint for the node.
    pub state: ReplicaState,
}

impl ReplicaDescriptor {
    /// Construct a replica descriptor hinted [ReplicaState::Up].
    pub fn new(node: NodeId, datacenter: &str) -> Self {
        Self {
            node,
            datacenter: datacenter.into(),
            state: ReplicaState::Up,
        }
    }

    /// Is this replica in the given datacenter?
    pub fn is_in(&self, datacenter: &str) -> bool {
        &*self.datacenter == datacenter
    }
}

/// Represents the cluster topology service.
#[cfg_attr(any(test, feature = "mockall"), mockall::automock)]
pub trait Topology: 'static + Send + Sync + std::fmt::Debug {
    /// The datacenter this process runs in. Replicas in this datacenter
    /// are queried before remote ones.
    fn local_datacenter(&self) -> String;

    /// All replicas expected to hold a copy of the blob, in the order
    /// the topology prefers them to be queried.
    fn ordered_replicas_for(
        &self,
        blob_id: &BlobId,
    ) -> BrResult<Vec<ReplicaDescriptor>>;

    /// Feed back an observed health hint for a node. Must not block.
    fn report_replica_state(&self, node: &NodeId, state: ReplicaState);
}

/// Trait-object [Topology].
pub type DynTopology = Arc<dyn Topology>;
