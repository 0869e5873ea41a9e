//! The in-memory connection pool, serving scripted replica behaviors.

use super::record_decoder::{
    encode_blob_properties_record, encode_blob_record,
    encode_user_metadata_record,
};
use blobrouter_api::*;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

/// A blob as held by a [MemReplicaBehavior::Serve] replica.
#[derive(Debug, Clone)]
pub struct MemBlob {
    /// The stored properties.
    pub properties: BlobProperties,
    /// The stored user metadata.
    pub user_metadata: Bytes,
    /// The stored content.
    pub data: Bytes,
}

impl MemBlob {
    /// Construct a blob with placeholder properties and no user metadata.
    pub fn new(data: Bytes) -> Self {
        Self {
            properties: BlobProperties {
                blob_size: data.len() as u64,
                content_type: "application/octet-stream".to_string(),
                service_id: "mem".to_string(),
                owner_id: "mem".to_string(),
                creation_time_ms: 0,
                time_to_live_secs: None,
            },
            user_metadata: Bytes::new(),
            data,
        }
    }
}

/// How a replica reached through a [MemConnectionPool] behaves.
#[derive(Debug, Clone)]
pub enum MemReplicaBehavior {
    /// Serve the blob after a delay.
    Serve {
        /// Time to wait before answering.
        delay: Duration,
        /// The blob to serve.
        blob: MemBlob,
    },

    /// Answer with an error code after a delay.
    Fail {
        /// Time to wait before answering.
        delay: Duration,
        /// The code to answer with.
        code: ServerErrorCode,
    },

    /// Answer `NoError` with a body that is not a valid record.
    CorruptRecord {
        /// Time to wait before answering.
        delay: Duration,
    },

    /// Answer with bytes that are not a valid response.
    Garbage {
        /// Time to wait before answering.
        delay: Duration,
    },

    /// Accept the request and never answer.
    Silent,

    /// Fail to connect.
    Refuse,

    /// Connect, then fail to send.
    SendFails,
}

impl MemReplicaBehavior {
    /// Serve `data` after `delay_ms`.
    pub fn serve(delay_ms: u64, data: &'static [u8]) -> Self {
        Self::Serve {
            delay: Duration::from_millis(delay_ms),
            blob: MemBlob::new(Bytes::from_static(data)),
        }
    }

    /// Answer `code` after `delay_ms`.
    pub fn fail(delay_ms: u64, code: ServerErrorCode) -> Self {
        Self::Fail {
            delay: Duration::from_millis(delay_ms),
            code,
        }
    }
}

/// Counters kept by a [MemConnectionPool].
#[derive(Debug, Default)]
pub struct MemPoolStats {
    active: AtomicUsize,
    max_active: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
    destroyed: AtomicUsize,
}

impl MemPoolStats {
    /// Connections currently checked out.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// The most connections that were ever checked out at once.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Connections handed out.
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Connections handed back after a clean exchange.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Connections handed back for destruction.
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// The in-memory connection pool. This is NOT a production module, it is
/// for testing only.
///
/// Each node is scripted with a [MemReplicaBehavior]. Nodes without a
/// behavior refuse connections. The pool records every request it sees
/// and how many connections were checked out at once.
#[derive(Debug, Default)]
pub struct MemConnectionPool {
    behaviors: Mutex<HashMap<NodeId, MemReplicaBehavior>>,
    requests: Arc<Mutex<Vec<(NodeId, GetRequest)>>>,
    stats: Arc<MemPoolStats>,
}

impl MemConnectionPool {
    /// Construct a new MemConnectionPool.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script how a node behaves for connections acquired from now on.
    pub fn set_behavior(&self, node: NodeId, behavior: MemReplicaBehavior) {
        self.behaviors
            .lock()
            .expect("MemConnectionPool behaviors Mutex is poisoned")
            .insert(node, behavior);
    }

    /// Connection counters.
    pub fn stats(&self) -> &MemPoolStats {
        &self.stats
    }

    /// Every request received so far, with the node it was sent to.
    pub fn requests(&self) -> Vec<(NodeId, GetRequest)> {
        self.requests
            .lock()
            .expect("MemConnectionPool requests Mutex is poisoned")
            .clone()
    }

    /// The nodes requests were sent to, in order.
    pub fn requested_nodes(&self) -> Vec<NodeId> {
        self.requests().into_iter().map(|(node, _)| node).collect()
    }
}

impl ConnectionPool for MemConnectionPool {
    fn acquire(
        &self,
        replica: ReplicaDescriptor,
        _timeout: Duration,
    ) -> BoxFut<'_, BrResult<DynConnection>> {
        let behavior = self
            .behaviors
            .lock()
            .expect("MemConnectionPool behaviors Mutex is poisoned")
            .get(&replica.node)
            .cloned();

        Box::pin(async move {
            let behavior = match behavior {
                None | Some(MemReplicaBehavior::Refuse) => {
                    return Err(BrError::connection(&replica.node, "refused"));
                }
                Some(behavior) => behavior,
            };
            let out: DynConnection = Box::new(MemConnection {
                node: replica.node,
                behavior,
                pending: Mutex::new(None),
                requests: self.requests.clone(),
                _guard: ActiveGuard::new(self.stats.clone()),
            });
            Ok(out)
        })
    }

    fn release(&self, connection: DynConnection) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        drop(connection);
    }

    fn destroy(&self, connection: DynConnection) {
        self.stats.destroyed.fetch_add(1, Ordering::SeqCst);
        drop(connection);
    }
}

/// Counts a connection as checked out for as long as it lives.
#[derive(Debug)]
struct ActiveGuard(Arc<MemPoolStats>);

impl ActiveGuard {
    fn new(stats: Arc<MemPoolStats>) -> Self {
        stats.acquired.fetch_add(1, Ordering::SeqCst);
        let active = stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        stats.max_active.fetch_max(active, Ordering::SeqCst);
        Self(stats)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct MemConnection {
    node: NodeId,
    behavior: MemReplicaBehavior,
    pending: Mutex<Option<GetRequest>>,
    requests: Arc<Mutex<Vec<(NodeId, GetRequest)>>>,
    _guard: ActiveGuard,
}

impl Connection for MemConnection {
    fn send(&self, data: Bytes) -> BoxFut<'_, BrResult<()>> {
        Box::pin(async move {
            if let MemReplicaBehavior::SendFails = self.behavior {
                return Err(BrError::connection(&self.node, "reset"));
            }
            let request = deserialize_get_request(data)?;
            self.requests
                .lock()
                .expect("MemConnectionPool requests Mutex is poisoned")
                .push((self.node.clone(), request.clone()));
            *self
                .pending
                .lock()
                .expect("MemConnection pending Mutex is poisoned") =
                Some(request);
            Ok(())
        })
    }

    fn receive(&self) -> BoxFut<'_, BrResult<Bytes>> {
        Box::pin(async move {
            let request = self
                .pending
                .lock()
                .expect("MemConnection pending Mutex is poisoned")
                .take()
                .ok_or_else(|| BrError::other("no request pending"))?;

            match &self.behavior {
                MemReplicaBehavior::Serve { delay, blob } => {
                    tokio::time::sleep(*delay).await;
                    let body = match request.flags() {
                        MessageFormatFlags::Blob => {
                            encode_blob_record(blob.data.clone())
                        }
                        MessageFormatFlags::BlobProperties => {
                            encode_blob_properties_record(&blob.properties)
                        }
                        MessageFormatFlags::BlobUserMetadata => {
                            encode_user_metadata_record(
                                blob.user_metadata.clone(),
                            )
                        }
                    };
                    Ok(serialize_get_response(
                        request.correlation_id,
                        ServerErrorCode::NoError,
                        body,
                    ))
                }
                MemReplicaBehavior::Fail { delay, code } => {
                    tokio::time::sleep(*delay).await;
                    Ok(serialize_get_response(
                        request.correlation_id,
                        *code,
                        Bytes::new(),
                    ))
                }
                MemReplicaBehavior::CorruptRecord { delay } => {
                    tokio::time::sleep(*delay).await;
                    Ok(serialize_get_response(
                        request.correlation_id,
                        ServerErrorCode::NoError,
                        Bytes::from_static(&[0xff, 0xff, 0xff]),
                    ))
                }
                MemReplicaBehavior::Garbage { delay } => {
                    tokio::time::sleep(*delay).await;
                    Ok(Bytes::from_static(&[0xff, 0xff, 0xff]))
                }
                MemReplicaBehavior::Silent => std::future::pending().await,
                MemReplicaBehavior::Refuse | MemReplicaBehavior::SendFails => {
                    Err(BrError::connection(&self.node, "closed"))
                }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use blobrouter_test_utils::id::{random_blob_id, replicas_in};

    #[tokio::test]
    async fn serves_scripted_blob_and_counts_connections() {
        let replica = replicas_in("dc1", "n", 1).remove(0);
        let pool = MemConnectionPool::create();
        pool.set_behavior(
            replica.node.clone(),
            MemReplicaBehavior::serve(0, b"hello"),
        );

        let blob_id = random_blob_id();
        let connection = pool
            .acquire(replica.clone(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(1, pool.stats().active());

        connection
            .send(serialize_get_request(
                5,
                "test",
                MessageFormatFlags::Blob,
                &blob_id,
            ))
            .await
            .unwrap();
        let response =
            deserialize_get_response(connection.receive().await.unwrap())
                .unwrap();
        assert_eq!(5, response.correlation_id);
        assert_eq!(ServerErrorCode::NoError, response.error_code().unwrap());

        pool.release(connection);
        assert_eq!(0, pool.stats().active());
        assert_eq!(1, pool.stats().max_active());
        assert_eq!(1, pool.stats().released());
        assert_eq!(vec![replica.node], pool.requested_nodes());
    }

    #[tokio::test]
    async fn unscripted_and_refusing_nodes_refuse() {
        let replicas = replicas_in("dc1", "n", 2);
        let pool = MemConnectionPool::create();
        pool.set_behavior(
            replicas[1].node.clone(),
            MemReplicaBehavior::Refuse,
        );

        for replica in replicas {
            pool.acquire(replica, Duration::from_secs(1))
                .await
                .unwrap_err();
        }
        assert_eq!(0, pool.stats().acquired());
    }
}
