//! Replica ordering and failure classification.

use blobrouter_api::*;
use std::collections::VecDeque;

/// The replicas an operation may still dispatch to, consumed front to back.
#[derive(Debug)]
pub(crate) struct CandidateQueue {
    local: VecDeque<ReplicaDescriptor>,
    remote: VecDeque<ReplicaDescriptor>,
    local_count: usize,
}

impl CandidateQueue {
    /// Split the topology's ordering into local and remote queues,
    /// keeping its order except that replicas hinted down go last.
    pub fn new(replicas: Vec<ReplicaDescriptor>, local_datacenter: &str) -> Self {
        let (mut local, mut remote): (Vec<_>, Vec<_>) = replicas
            .into_iter()
            .partition(|replica| replica.is_in(local_datacenter));
        local.sort_by_key(|replica| replica.state == ReplicaState::Down);
        remote.sort_by_key(|replica| replica.state == ReplicaState::Down);
        Self {
            local_count: local.len(),
            local: local.into(),
            remote: remote.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.local.len() + self.remote.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the next replica to dispatch to.
    ///
    /// Local replicas come first, unless `down_replica_count` has reached
    /// `remote_admission_down_percent` of the local replica count, in which
    /// case remote replicas are admitted ahead of the remaining local ones.
    pub fn next(
        &mut self,
        down_replica_count: usize,
        remote_admission_down_percent: u8,
    ) -> Option<ReplicaDescriptor> {
        let admit_remote = down_replica_count > 0
            && down_replica_count * 100
                >= self.local_count * remote_admission_down_percent as usize;
        if admit_remote {
            if let Some(replica) = self.remote.pop_front() {
                return Some(replica);
            }
        }
        self.local
            .pop_front()
            .or_else(|| self.remote.pop_front())
    }
}

/// Reduce the outcomes of an operation that saw no success to a single
/// classification.
///
/// `unanswered` is the number of candidate replicas that have not reported
/// an outcome, dispatched or not. The result depends only on the counts,
/// never on the order outcomes arrived in. Absence is only reported when
/// every candidate answered and all of them said the blob is absent.
pub(crate) fn classify_failure(
    tally: &OutcomeTally,
    unanswered: usize,
) -> CoordinatorErrorKind {
    use CoordinatorErrorKind::*;
    use ReplicaErrorKind as R;

    if tally.count(R::Corrupt) > 0 {
        CorruptBlob
    } else if tally.count(R::Unexpected) > 0 {
        UnexpectedInternalError
    } else if tally.count(R::Unreachable) > 0 {
        Unavailable
    } else if unanswered > 0
        || tally.count(R::Timeout) > 0
        || tally.responded() == 0
    {
        OperationTimedOut
    } else if tally.count(R::Deleted) > 0 {
        BlobDeleted
    } else if tally.count(R::Expired) > 0 {
        BlobExpired
    } else {
        BlobDoesNotExist
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use blobrouter_test_utils::id::replicas_in;
    use CoordinatorErrorKind::*;
    use ReplicaErrorKind as R;

    fn tally(kinds: &[ReplicaErrorKind]) -> OutcomeTally {
        let mut tally = OutcomeTally {
            queried: kinds.len(),
            ..Default::default()
        };
        for kind in kinds {
            tally.record(*kind);
        }
        tally
    }

    #[test]
    fn precedence_table() {
        let cases: &[(&[ReplicaErrorKind], usize, CoordinatorErrorKind)] = &[
            (&[R::NotFound, R::NotFound, R::NotFound], 0, BlobDoesNotExist),
            (&[R::Deleted, R::Deleted, R::Deleted], 0, BlobDeleted),
            (&[R::NotFound, R::Deleted, R::NotFound], 0, BlobDeleted),
            (&[R::NotFound, R::Expired], 0, BlobExpired),
            (&[R::Expired, R::Deleted], 0, BlobDeleted),
            // absence is never reported while a replica is unaccounted for
            (&[R::NotFound, R::NotFound], 1, OperationTimedOut),
            (&[R::NotFound, R::NotFound, R::Timeout], 0, OperationTimedOut),
            (&[], 3, OperationTimedOut),
            (&[R::Unreachable, R::NotFound], 1, Unavailable),
            (&[R::Unreachable, R::NotFound, R::NotFound], 0, Unavailable),
            (&[R::Unreachable, R::Timeout], 0, Unavailable),
            // corrupt and unexpected surface over everything else
            (&[R::NotFound, R::NotFound, R::Corrupt], 0, CorruptBlob),
            (&[R::Unreachable, R::Corrupt], 1, CorruptBlob),
            (&[R::Unexpected, R::Corrupt], 0, CorruptBlob),
            (&[R::Deleted, R::Unexpected], 0, UnexpectedInternalError),
            (&[R::Unexpected, R::Unreachable], 0, UnexpectedInternalError),
        ];

        for (kinds, unanswered, expect) in cases {
            assert_eq!(
                *expect,
                classify_failure(&tally(kinds), *unanswered),
                "{kinds:?} with {unanswered} unanswered",
            );
        }
    }

    #[test]
    fn classification_is_order_independent() {
        let kinds = [R::NotFound, R::Unreachable, R::Deleted, R::NotFound];
        let expect = classify_failure(&tally(&kinds), 0);

        // every rotation and the reverse give the same answer
        for i in 0..kinds.len() {
            let mut rotated = kinds;
            rotated.rotate_left(i);
            assert_eq!(expect, classify_failure(&tally(&rotated), 0));
            rotated.reverse();
            assert_eq!(expect, classify_failure(&tally(&rotated), 0));
        }
    }

    #[test]
    fn local_replicas_first_and_down_hints_last() {
        let mut replicas = replicas_in("remote", "r", 2);
        let mut local = replicas_in("local", "l", 3);
        local[0].state = ReplicaState::Down;
        replicas.extend(local.clone());

        let mut queue = CandidateQueue::new(replicas, "local");
        assert_eq!(5, queue.len());

        let order = std::iter::from_fn(|| queue.next(0, 50))
            .map(|replica| replica.node.to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            vec!["l-1:6667", "l-2:6667", "l-0:6667", "r-0:6667", "r-1:6667"],
            order
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn remote_admitted_once_enough_local_replicas_are_down() {
        let mut replicas = replicas_in("local", "l", 4);
        replicas.extend(replicas_in("remote", "r", 2));
        let mut queue = CandidateQueue::new(replicas, "local");

        // 1 of 4 down is below 50%
        assert_eq!("l-0:6667", queue.next(1, 50).unwrap().node.to_string());
        // 2 of 4 down reaches 50%
        assert_eq!("r-0:6667", queue.next(2, 50).unwrap().node.to_string());
        assert_eq!("r-1:6667", queue.next(3, 50).unwrap().node.to_string());
        // remote exhausted, back to local
        assert_eq!("l-1:6667", queue.next(3, 50).unwrap().node.to_string());
    }

    #[test]
    fn no_local_replicas() {
        let mut queue =
            CandidateQueue::new(replicas_in("remote", "r", 1), "local");
        assert_eq!("r-0:6667", queue.next(0, 50).unwrap().node.to_string());
        assert!(queue.next(0, 50).is_none());
    }
}
