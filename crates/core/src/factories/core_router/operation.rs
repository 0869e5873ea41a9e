//! The operation coordinator shared by every get kind.

use super::collector::{OperationOutcome, ResponseCollector};
use super::config::CoreRouterConfig;
use super::policy::{classify_failure, CandidateQueue};
use super::replica_request::ReplicaRequest;
use super::OperationKind;
use blobrouter_api::*;
use std::sync::{
    atomic::{AtomicU8, AtomicUsize, Ordering},
    Arc, OnceLock,
};

/// Lifecycle of an [Operation].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperationState {
    /// Created, not yet started.
    Pending = 0,
    /// Fetching candidates and sending the first requests.
    Dispatching = 1,
    /// Waiting for replica outcomes.
    AwaitingResponses = 2,
    /// Resolved with a payload.
    Succeeded = 3,
    /// Resolved with an error.
    Failed = 4,
}

impl OperationState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Dispatching,
            2 => Self::AwaitingResponses,
            3 => Self::Succeeded,
            _ => Self::Failed,
        }
    }

    /// Has the operation reached its single terminal state?
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Coordinates the replica requests reading one blob.
///
/// Call [Operation::start] and then [Operation::await_result] from within a
/// tokio runtime. Replica requests are spawned onto the runtime and report
/// back through a per-operation response collector. The operation resolves
/// exactly once, after which its payload (if any) can be read any number of
/// times with [Operation::payload].
#[derive(Debug)]
pub struct Operation<K: OperationKind> {
    context: Arc<OperationContext>,
    blob_id: BlobId,
    connection_pool: DynConnectionPool,
    blob_decoder: DynBlobDecoder,
    parallel_request_count: usize,
    remote_admission_down_percent: u8,
    state: AtomicU8,
    candidates: CandidateQueue,
    in_flight: usize,
    tally: OutcomeTally,
    down_replica_count: Arc<AtomicUsize>,
    collector: ResponseCollector<K::Output>,
    payload: OnceLock<K::Output>,
    resolution: OnceLock<Result<(), CoordinatorError>>,
}

impl<K: OperationKind> Operation<K> {
    /// Construct a pending operation.
    pub fn new(
        context: Arc<OperationContext>,
        blob_id: BlobId,
        connection_pool: DynConnectionPool,
        blob_decoder: DynBlobDecoder,
        config: &CoreRouterConfig,
    ) -> Self {
        Self {
            context,
            blob_id,
            connection_pool,
            blob_decoder,
            parallel_request_count: (config.parallel_request_count as usize)
                .max(1),
            remote_admission_down_percent: config
                .remote_admission_down_percent,
            state: AtomicU8::new(OperationState::Pending as u8),
            candidates: CandidateQueue::new(Vec::new(), ""),
            in_flight: 0,
            tally: OutcomeTally::default(),
            down_replica_count: Arc::new(AtomicUsize::new(0)),
            collector: ResponseCollector::new(),
            payload: OnceLock::new(),
            resolution: OnceLock::new(),
        }
    }

    /// The current state.
    pub fn state(&self) -> OperationState {
        OperationState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The replica outcomes counted so far.
    pub fn tally(&self) -> &OutcomeTally {
        &self.tally
    }

    /// How many replicas of this operation were found unreachable.
    pub fn down_replica_count(&self) -> usize {
        self.down_replica_count.load(Ordering::Relaxed)
    }

    /// Fetch the candidate replicas and dispatch the first requests.
    pub fn start(&mut self) -> Result<(), CoordinatorError> {
        if !self.transition(OperationState::Pending, OperationState::Dispatching)
        {
            return Err(self.misuse("start called twice"));
        }

        let replicas =
            match self.context.topology.ordered_replicas_for(&self.blob_id) {
                Ok(replicas) => replicas,
                Err(err) => {
                    tracing::error!(
                        "could not get replicas for blob {}: {err}",
                        self.blob_id
                    );
                    return self.resolve_failure(
                        CoordinatorErrorKind::UnexpectedInternalError,
                    );
                }
            };
        if replicas.is_empty() {
            tracing::error!("topology has no replicas for blob {}", self.blob_id);
            return self
                .resolve_failure(CoordinatorErrorKind::UnexpectedInternalError);
        }

        self.candidates = CandidateQueue::new(
            replicas,
            &self.context.topology.local_datacenter(),
        );
        tracing::debug!(
            "{} {} for blob {} has {} candidate replicas",
            K::NAME,
            self.context.correlation_id,
            self.blob_id,
            self.candidates.len()
        );
        self.dispatch();
        self.transition(
            OperationState::Dispatching,
            OperationState::AwaitingResponses,
        );
        Ok(())
    }

    /// Drive the operation until it resolves, and return the resolution.
    /// Once resolved, further calls return the same resolution.
    pub async fn await_result(&mut self) -> Result<(), CoordinatorError> {
        if let Some(resolution) = self.resolution.get() {
            return resolution.clone();
        }
        if self.state() == OperationState::Pending {
            return Err(self.misuse("await_result called before start"));
        }

        loop {
            if self.in_flight == 0 && self.candidates.is_empty() {
                let kind = classify_failure(&self.tally, 0);
                return self.resolve_failure(kind);
            }

            let Some(outcome) =
                self.collector.poll_until(self.context.deadline).await
            else {
                return self.resolve_deadline();
            };

            if self.context.is_expired() {
                tracing::debug!(
                    "discarding outcome from {} received after the deadline",
                    outcome.replica.node
                );
                return self.resolve_deadline();
            }

            if let Some(resolution) = self.apply(outcome) {
                return resolution;
            }
            self.dispatch();
        }
    }

    /// The payload, once the operation resolved successfully.
    ///
    /// Fails with [CoordinatorErrorKind::UnexpectedInternalError] if called
    /// before resolution or after a failed resolution.
    pub fn payload(&self) -> Result<K::Output, CoordinatorError> {
        match (self.state(), self.payload.get()) {
            (OperationState::Succeeded, Some(payload)) => Ok(payload.clone()),
            (state, _) => Err(self.misuse(&format!(
                "payload requested in state {state:?}"
            ))),
        }
    }

    fn apply(
        &mut self,
        outcome: OperationOutcome<K::Output>,
    ) -> Option<Result<(), CoordinatorError>> {
        self.in_flight -= 1;
        let OperationOutcome { replica, result } = outcome;
        match result {
            Ok(payload) => {
                self.tally.succeeded = true;
                if self.payload.set(payload).is_err() {
                    tracing::debug!(
                        "payload already installed, ignoring the one from {}",
                        replica.node
                    );
                }
                tracing::debug!(
                    "{} {} for blob {} succeeded from {}",
                    K::NAME,
                    self.context.correlation_id,
                    self.blob_id,
                    replica.node
                );
                Some(self.resolve(Ok(())))
            }
            Err(kind) => {
                tracing::debug!(
                    "{} {} for blob {}: {} answered {kind}",
                    K::NAME,
                    self.context.correlation_id,
                    self.blob_id,
                    replica.node
                );
                self.tally.record(kind);
                None
            }
        }
    }

    fn dispatch(&mut self) {
        while self.in_flight < self.parallel_request_count
            && !self.state().is_resolved()
            && !self.context.is_expired()
        {
            let down = self.down_replica_count.load(Ordering::Relaxed);
            let Some(replica) = self
                .candidates
                .next(down, self.remote_admission_down_percent)
            else {
                break;
            };

            tracing::debug!(
                "{} {} dispatching to {} ({} in flight, {} down)",
                K::NAME,
                self.context.correlation_id,
                replica.node,
                self.in_flight,
                down
            );
            let request = ReplicaRequest::<K>::new(
                self.context.clone(),
                &self.blob_id,
                replica,
                self.connection_pool.clone(),
                self.blob_decoder.clone(),
                self.down_replica_count.clone(),
            );
            self.in_flight += 1;
            self.tally.queried += 1;
            tokio::task::spawn(request.run(self.collector.sender()));
        }
    }

    fn resolve_deadline(&mut self) -> Result<(), CoordinatorError> {
        let unanswered = self.in_flight + self.candidates.len();
        let kind = classify_failure(&self.tally, unanswered);
        tracing::debug!(
            "{} {} reached its deadline with {unanswered} replicas unanswered",
            K::NAME,
            self.context.correlation_id
        );
        self.resolve_failure(kind)
    }

    fn resolve_failure(
        &mut self,
        kind: CoordinatorErrorKind,
    ) -> Result<(), CoordinatorError> {
        let err = self.error(kind);
        self.resolve(Err(err))
    }

    /// The single terminal transition. A second resolution attempt keeps
    /// the first result.
    fn resolve(
        &mut self,
        result: Result<(), CoordinatorError>,
    ) -> Result<(), CoordinatorError> {
        let to = match result {
            Ok(()) => OperationState::Succeeded,
            Err(_) => OperationState::Failed,
        };
        let resolved = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if OperationState::from_u8(current).is_resolved() {
                    None
                } else {
                    Some(to as u8)
                }
            })
            .is_ok();
        if !resolved {
            return match self.resolution.get() {
                Some(resolution) => resolution.clone(),
                None => result,
            };
        }

        match &result {
            Ok(()) => (),
            Err(err) => match err.kind {
                CoordinatorErrorKind::CorruptBlob
                | CoordinatorErrorKind::UnexpectedInternalError => {
                    tracing::error!("{} failed: {err}", K::NAME)
                }
                CoordinatorErrorKind::Unavailable
                | CoordinatorErrorKind::OperationTimedOut => {
                    tracing::warn!("{} failed: {err}", K::NAME)
                }
                _ => tracing::debug!("{} failed: {err}", K::NAME),
            },
        }
        let _ = self.resolution.set(result.clone());

        // Requests still in flight report into a closed collector.
        self.collector.close();
        for late in self.collector.drain() {
            tracing::debug!(
                "{} {} discarding outcome from {} after resolution: {:?}",
                K::NAME,
                self.context.correlation_id,
                late.replica.node,
                late.result.as_ref().map(|_| ())
            );
        }

        result
    }

    fn transition(&self, from: OperationState, to: OperationState) -> bool {
        self.state
            .compare_exchange(
                from as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn error(&self, kind: CoordinatorErrorKind) -> CoordinatorError {
        CoordinatorError {
            kind,
            blob_id: self.blob_id.clone(),
            correlation_id: self.context.correlation_id,
            tally: self.tally.clone(),
        }
    }

    fn misuse(&self, what: &str) -> CoordinatorError {
        let err = self.error(CoordinatorErrorKind::UnexpectedInternalError);
        tracing::error!("{} misuse, {what}: {err}", K::NAME);
        err
    }
}
