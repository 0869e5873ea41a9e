//! Types shared by every replicated read operation: the per-call context,
//! replica outcome classification, and the error reported to callers.

use crate::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Immutable per-call context, shared by reference with every replica
/// request spawned for the call.
#[derive(Debug)]
pub struct OperationContext {
    /// Correlation id sent with every request of this call.
    pub correlation_id: u64,

    /// Client id sent with every request of this call.
    pub client_id: Arc<str>,

    /// Absolute deadline of the call. Computed once, never extended.
    pub deadline: Instant,

    /// The topology used to order replicas and to report hints to.
    pub topology: DynTopology,

    /// The metrics sink.
    pub metrics: DynMetrics,
}

impl OperationContext {
    /// Construct a context whose deadline is `timeout` from now.
    pub fn new(
        correlation_id: u64,
        client_id: Arc<str>,
        timeout: Duration,
        topology: DynTopology,
        metrics: DynMetrics,
    ) -> Self {
        Self {
            correlation_id,
            client_id,
            deadline: Instant::now() + timeout,
            topology,
            metrics,
        }
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Has the deadline passed?
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Classification of a failed request to a single replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReplicaErrorKind {
    /// The replica does not have the blob.
    NotFound,
    /// The replica says the blob was deleted.
    Deleted,
    /// The replica says the blob expired.
    Expired,
    /// The replica could not be reached or could not serve the request.
    Unreachable,
    /// The replica did not answer before the operation deadline.
    Timeout,
    /// The replica answered with a record that failed to decode.
    Corrupt,
    /// The replica violated the protocol, or an internal defect occurred.
    Unexpected,
}

impl ReplicaErrorKind {
    /// Map a storage node error code to a classification.
    /// Returns `None` for [ServerErrorCode::NoError].
    pub fn from_server_error(code: ServerErrorCode) -> Option<Self> {
        match code {
            ServerErrorCode::NoError => None,
            ServerErrorCode::BlobNotFound => Some(Self::NotFound),
            ServerErrorCode::BlobDeleted => Some(Self::Deleted),
            ServerErrorCode::BlobExpired => Some(Self::Expired),
            ServerErrorCode::DataCorrupt => Some(Self::Corrupt),
            ServerErrorCode::IoError
            | ServerErrorCode::DiskUnavailable
            | ServerErrorCode::ReplicaUnavailable => Some(Self::Unreachable),
            ServerErrorCode::PartitionUnknown
            | ServerErrorCode::UnknownError => Some(Self::Unexpected),
        }
    }

    /// Did the replica affirmatively report that it cannot serve the blob?
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound | Self::Deleted | Self::Expired)
    }
}

impl std::fmt::Display for ReplicaErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Per-operation count of replica outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    /// How many replica requests were dispatched.
    pub queried: usize,

    /// Whether any replica answered successfully.
    pub succeeded: bool,

    /// Count of failed requests per classification.
    pub errors: BTreeMap<ReplicaErrorKind, usize>,
}

impl OutcomeTally {
    /// Count a failed request.
    pub fn record(&mut self, kind: ReplicaErrorKind) {
        *self.errors.entry(kind).or_default() += 1;
    }

    /// How many requests failed with the given classification.
    pub fn count(&self, kind: ReplicaErrorKind) -> usize {
        self.errors.get(&kind).copied().unwrap_or_default()
    }

    /// How many requests have reported an outcome.
    pub fn responded(&self) -> usize {
        self.errors.values().sum::<usize>() + usize::from(self.succeeded)
    }
}

impl std::fmt::Display for OutcomeTally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "queried: {}", self.queried)?;
        if self.succeeded {
            f.write_str(", succeeded")?;
        }
        for (kind, count) in self.errors.iter() {
            write!(f, ", {kind}: {count}")?;
        }
        Ok(())
    }
}

/// The single terminal failure classification of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorErrorKind {
    /// Every queried replica said the blob does not exist.
    BlobDoesNotExist,
    /// Every queried replica said the blob is absent, and one said deleted.
    BlobDeleted,
    /// Every queried replica said the blob is absent, and one said expired.
    BlobExpired,
    /// Some replica could not be reached, so absence cannot be confirmed.
    Unavailable,
    /// The operation deadline passed before the outcome was known.
    OperationTimedOut,
    /// A replica returned a record that could not be decoded.
    CorruptBlob,
    /// A protocol violation or internal defect, including caller misuse.
    UnexpectedInternalError,
}

impl CoordinatorErrorKind {
    /// Can a caller expect a fresh operation to possibly succeed?
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::OperationTimedOut)
    }
}

impl std::fmt::Display for CoordinatorErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::BlobDoesNotExist => "blob does not exist",
            Self::BlobDeleted => "blob deleted",
            Self::BlobExpired => "blob expired",
            Self::Unavailable => "replicas unavailable",
            Self::OperationTimedOut => "operation timed out",
            Self::CorruptBlob => "corrupt blob",
            Self::UnexpectedInternalError => "unexpected internal error",
        })
    }
}

/// The error an operation resolves to, with enough context to diagnose it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} for blob {blob_id} (correlation id: {correlation_id}, {tally})")]
pub struct CoordinatorError {
    /// The classification.
    pub kind: CoordinatorErrorKind,

    /// The blob the operation was for.
    pub blob_id: BlobId,

    /// The correlation id of the operation.
    pub correlation_id: u64,

    /// The replica outcomes seen at resolution.
    pub tally: OutcomeTally,
}

impl CoordinatorError {
    /// Is this error worth retrying with a fresh operation?
    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn server_error_mapping() {
        use ReplicaErrorKind::*;
        use ServerErrorCode as C;

        assert_eq!(None, ReplicaErrorKind::from_server_error(C::NoError));
        for (code, kind) in [
            (C::BlobNotFound, NotFound),
            (C::BlobDeleted, Deleted),
            (C::BlobExpired, Expired),
            (C::DataCorrupt, Corrupt),
            (C::IoError, Unreachable),
            (C::DiskUnavailable, Unreachable),
            (C::ReplicaUnavailable, Unreachable),
            (C::PartitionUnknown, Unexpected),
            (C::UnknownError, Unexpected),
        ] {
            assert_eq!(Some(kind), ReplicaErrorKind::from_server_error(code));
        }
    }

    #[test]
    fn tally_counts_and_display() {
        let mut tally = OutcomeTally {
            queried: 3,
            ..Default::default()
        };
        tally.record(ReplicaErrorKind::NotFound);
        tally.record(ReplicaErrorKind::Unreachable);
        tally.record(ReplicaErrorKind::NotFound);

        assert_eq!(2, tally.count(ReplicaErrorKind::NotFound));
        assert_eq!(0, tally.count(ReplicaErrorKind::Deleted));
        assert_eq!(3, tally.responded());
        assert_eq!(
            "queried: 3, NotFound: 2, Unreachable: 1",
            tally.to_string()
        );
    }

    #[test]
    fn coordinator_error_display_has_context() {
        let err = CoordinatorError {
            kind: CoordinatorErrorKind::Unavailable,
            blob_id: BlobId::new(1, 1, 1, Bytes::from_static(b"x")).unwrap(),
            correlation_id: 12,
            tally: OutcomeTally::default(),
        };
        let s = err.to_string();
        assert!(s.starts_with("replicas unavailable for blob "));
        assert!(s.contains("correlation id: 12"));
        assert!(err.is_retriable());
    }

    #[test]
    fn retriable_kinds() {
        use CoordinatorErrorKind::*;
        for kind in [Unavailable, OperationTimedOut] {
            assert!(kind.is_retriable());
        }
        for kind in [
            BlobDoesNotExist,
            BlobDeleted,
            BlobExpired,
            CorruptBlob,
            UnexpectedInternalError,
        ] {
            assert!(!kind.is_retriable());
        }
    }
}
