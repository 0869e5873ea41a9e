//! A test topology where every blob is placed on the same fixed replica set.

use blobrouter_api::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The in-memory topology. This is NOT a production module, it is for
/// testing only.
///
/// Health hints reported by the router are kept and reflected in the
/// descriptors handed out afterwards.
#[derive(Debug)]
pub struct MemTopology {
    local_datacenter: String,
    replicas: Vec<ReplicaDescriptor>,
    hints: Mutex<HashMap<NodeId, ReplicaState>>,
}

impl MemTopology {
    /// Construct a topology placing every blob on `replicas`, ordered as
    /// given.
    pub fn create(
        local_datacenter: &str,
        replicas: Vec<ReplicaDescriptor>,
    ) -> Arc<Self> {
        Arc::new(Self {
            local_datacenter: local_datacenter.to_string(),
            replicas,
            hints: Mutex::new(HashMap::new()),
        })
    }

    /// The last health hint reported for a node, if any.
    pub fn hint(&self, node: &NodeId) -> Option<ReplicaState> {
        self.hints
            .lock()
            .expect("MemTopology hints Mutex is poisoned")
            .get(node)
            .copied()
    }
}

impl Topology for MemTopology {
    fn local_datacenter(&self) -> String {
        self.local_datacenter.clone()
    }

    fn ordered_replicas_for(
        &self,
        _blob_id: &BlobId,
    ) -> BrResult<Vec<ReplicaDescriptor>> {
        let hints = self
            .hints
            .lock()
            .map_err(|_| BrError::other("MemTopology hints Mutex is poisoned"))?;
        Ok(self
            .replicas
            .iter()
            .map(|replica| ReplicaDescriptor {
                state: hints
                    .get(&replica.node)
                    .copied()
                    .unwrap_or(replica.state),
                ..replica.clone()
            })
            .collect())
    }

    fn report_replica_state(&self, node: &NodeId, state: ReplicaState) {
        self.hints
            .lock()
            .expect("MemTopology hints Mutex is poisoned")
            .insert(node.clone(), state);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use blobrouter_test_utils::id::{random_blob_id, replicas_in};

    #[test]
    fn reported_hints_show_up_in_descriptors() {
        let replicas = replicas_in("dc1", "n", 2);
        let topology = MemTopology::create("dc1", replicas.clone());
        assert_eq!("dc1", topology.local_datacenter());

        topology.report_replica_state(&replicas[1].node, ReplicaState::Down);
        assert_eq!(Some(ReplicaState::Down), topology.hint(&replicas[1].node));
        assert_eq!(None, topology.hint(&replicas[0].node));

        let out = topology.ordered_replicas_for(&random_blob_id()).unwrap();
        assert_eq!(ReplicaState::Up, out[0].state);
        assert_eq!(ReplicaState::Down, out[1].state);
        assert_eq!(replicas[1].node, out[1].node);
    }
}
