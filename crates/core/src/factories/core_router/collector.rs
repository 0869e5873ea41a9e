//! Rendezvous point between replica request tasks and the operation that
//! spawned them.

use blobrouter_api::*;
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    time::Instant,
};

/// The outcome of a single replica request.
#[derive(Debug)]
pub(crate) struct OperationOutcome<T> {
    pub replica: ReplicaDescriptor,
    pub result: Result<T, ReplicaErrorKind>,
}

/// The producer half handed to each replica request.
#[derive(Debug)]
pub(crate) struct OutcomeSender<T>(UnboundedSender<OperationOutcome<T>>);

impl<T> Clone for OutcomeSender<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: std::fmt::Debug> OutcomeSender<T> {
    /// Never blocks. If the operation has already resolved the outcome
    /// is dropped here.
    pub fn push(&self, outcome: OperationOutcome<T>) {
        if let Err(err) = self.0.send(outcome) {
            let outcome = err.0;
            tracing::debug!(
                "discarding late outcome from {}: {:?}",
                outcome.replica.node,
                outcome.result.as_ref().map(|_| ()),
            );
        }
    }
}

/// Queue of outcomes, consumed by the owning operation in arrival order.
#[derive(Debug)]
pub(crate) struct ResponseCollector<T> {
    tx: UnboundedSender<OperationOutcome<T>>,
    rx: UnboundedReceiver<OperationOutcome<T>>,
}

impl<T> ResponseCollector<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> OutcomeSender<T> {
        OutcomeSender(self.tx.clone())
    }

    /// Wait for the next outcome until the deadline.
    /// Returns `None` once the deadline has passed.
    pub async fn poll_until(
        &mut self,
        deadline: Instant,
    ) -> Option<OperationOutcome<T>> {
        // The collector holds a sender itself, so `recv` only yields None
        // after `close`.
        tokio::time::timeout_at(deadline, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Stop accepting outcomes. Pushes after this are dropped by the sender.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Take every outcome already queued, without waiting.
    pub fn drain(&mut self) -> Vec<OperationOutcome<T>> {
        let mut out = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            out.push(outcome);
        }
        out
    }
}
