//! A single request to a single replica.

use super::collector::{OperationOutcome, OutcomeSender};
use super::OperationKind;
use blobrouter_api::*;
use futures::FutureExt;
use std::{
    marker::PhantomData,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::time::{timeout_at, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestState {
    Created,
    Sent,
    Succeeded,
    Failed(ReplicaErrorKind),
}

/// Owned by the task executing it. Reports exactly one outcome.
pub(crate) struct ReplicaRequest<K: OperationKind> {
    context: Arc<OperationContext>,
    replica: ReplicaDescriptor,
    request: bytes::Bytes,
    connection_pool: DynConnectionPool,
    blob_decoder: DynBlobDecoder,
    down_replica_count: Arc<AtomicUsize>,
    state: RequestState,
    _kind: PhantomData<fn() -> K>,
}

impl<K: OperationKind> ReplicaRequest<K> {
    pub fn new(
        context: Arc<OperationContext>,
        blob_id: &BlobId,
        replica: ReplicaDescriptor,
        connection_pool: DynConnectionPool,
        blob_decoder: DynBlobDecoder,
        down_replica_count: Arc<AtomicUsize>,
    ) -> Self {
        let request = serialize_get_request(
            context.correlation_id,
            &context.client_id,
            K::FLAGS,
            blob_id,
        );
        tracing::trace!(
            "created {} request {} for {}",
            K::NAME,
            context.correlation_id,
            replica.node
        );
        Self {
            context,
            replica,
            request,
            connection_pool,
            blob_decoder,
            down_replica_count,
            state: RequestState::Created,
            _kind: PhantomData,
        }
    }

    /// Execute the request and push its outcome to the collector.
    ///
    /// Collaborator panics, whether in the exchange itself or in the
    /// metrics sink and topology called around it, never prevent the push.
    pub async fn run(mut self, collector: OutcomeSender<K::Output>) {
        let node = self.replica.node.clone();
        let metrics = self.context.metrics.clone();
        self.observe("metrics", || metrics.increment_counter(K::METRIC, &node));
        let start = Instant::now();

        let caught = AssertUnwindSafe(self.execute()).catch_unwind().await;
        let result = match caught {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    "{} request {} to {node} panicked",
                    K::NAME,
                    self.context.correlation_id
                );
                Err(ReplicaErrorKind::Unexpected)
            }
        };

        let latency = start.elapsed();
        self.observe("metrics", || {
            metrics.record_latency(K::METRIC, &node, latency)
        });

        let hint = match &result {
            Ok(_) => {
                self.state = RequestState::Succeeded;
                Some(ReplicaState::Up)
            }
            Err(kind) => {
                self.state = RequestState::Failed(*kind);
                match kind {
                    ReplicaErrorKind::Unreachable => {
                        self.down_replica_count.fetch_add(1, Ordering::Relaxed);
                        Some(ReplicaState::Down)
                    }
                    // no evidence either way
                    ReplicaErrorKind::Timeout => None,
                    _ => Some(ReplicaState::Up),
                }
            }
        };
        if let Some(hint) = hint {
            let topology = self.context.topology.clone();
            self.observe("topology", || {
                topology.report_replica_state(&node, hint)
            });
        }
        tracing::trace!(
            "{} request {} to {node} finished: {:?}",
            K::NAME,
            self.context.correlation_id,
            self.state
        );

        collector.push(OperationOutcome {
            replica: self.replica,
            result,
        });
    }

    /// Call into a fire-and-forget collaborator, logging a panic instead of
    /// unwinding through the request.
    fn observe(&self, collaborator: &str, f: impl FnOnce()) {
        if std::panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
            tracing::error!(
                "{collaborator} panicked during {} request {} to {}",
                K::NAME,
                self.context.correlation_id,
                self.replica.node
            );
        }
    }

    async fn execute(&mut self) -> Result<K::Output, ReplicaErrorKind> {
        let deadline = self.context.deadline;
        let node = &self.replica.node;

        let connection = match timeout_at(
            deadline,
            self.connection_pool
                .acquire(self.replica.clone(), self.context.remaining()),
        )
        .await
        {
            Err(_) => return Err(ReplicaErrorKind::Timeout),
            Ok(Err(err)) => {
                tracing::warn!("could not get connection to {node}: {err}");
                return Err(ReplicaErrorKind::Unreachable);
            }
            Ok(Ok(connection)) => connection,
        };

        let sent =
            timeout_at(deadline, connection.send(self.request.clone())).await;
        match sent {
            Err(_) => {
                self.connection_pool.destroy(connection);
                return Err(ReplicaErrorKind::Timeout);
            }
            Ok(Err(err)) => {
                tracing::warn!("could not send request to {node}: {err}");
                self.connection_pool.destroy(connection);
                return Err(ReplicaErrorKind::Unreachable);
            }
            Ok(Ok(())) => self.state = RequestState::Sent,
        }

        let received = timeout_at(deadline, connection.receive()).await;
        let data = match received {
            Err(_) => {
                // The pool reclaims the abandoned connection.
                self.connection_pool.destroy(connection);
                return Err(ReplicaErrorKind::Timeout);
            }
            Ok(Err(err)) => {
                tracing::warn!("could not receive response from {node}: {err}");
                self.connection_pool.destroy(connection);
                return Err(ReplicaErrorKind::Unreachable);
            }
            Ok(Ok(data)) => {
                self.connection_pool.release(connection);
                data
            }
        };

        let response = match deserialize_get_response(data) {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("invalid response from {node}: {err}");
                return Err(ReplicaErrorKind::Unexpected);
            }
        };
        if response.correlation_id != self.context.correlation_id {
            tracing::error!(
                "response from {node} has correlation id {}, expected {}",
                response.correlation_id,
                self.context.correlation_id
            );
            return Err(ReplicaErrorKind::Unexpected);
        }
        let code = match response.error_code() {
            Ok(code) => code,
            Err(err) => {
                tracing::error!("invalid response from {node}: {err}");
                return Err(ReplicaErrorKind::Unexpected);
            }
        };
        if let Some(kind) = ReplicaErrorKind::from_server_error(code) {
            tracing::debug!("{node} answered {code:?}");
            return Err(kind);
        }

        K::decode(&*self.blob_decoder, response.body).map_err(|err| {
            tracing::error!("could not decode {} from {node}: {err}", K::NAME);
            ReplicaErrorKind::Corrupt
        })
    }
}

#[cfg(test)]
mod test;
