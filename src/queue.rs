use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use crate::chain::{SubmitError, TxOutcome};

/// The unit of work flowing through the queue (§3 Pending Request).
pub struct PendingRequest {
    pub payload: Vec<u8>,
    pub gas_limit: u64,
    pub grantee: String,
    pub resolve: oneshot::Sender<Result<TxOutcome, SubmitError>>,
}

impl PendingRequest {
    /// Resolves the request's future. A dropped receiver (abandoned HTTP
    /// request) makes this a silent no-op, matching `oneshot::Sender::send`'s
    /// `Err` being ignorable.
    pub fn resolve(self, outcome: Result<TxOutcome, SubmitError>) {
        let _ = self.resolve.send(outcome);
    }
}

/// Thread-safe append-only queue of pending grant/revoke requests (§4.2
/// Broadcast Queue). Guarded by a `tokio::sync::Mutex<VecDeque<_>>`, the same
/// shared-mutable-state idiom the teacher uses for the granter's nonce and
/// keeper state.
#[derive(Clone)]
pub struct BroadcastQueue {
    pending: Arc<Mutex<VecDeque<PendingRequest>>>,
}

impl BroadcastQueue {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Appends a request and returns the receiver half of its completion
    /// future. Never touches the chain — only the in-memory deque.
    pub async fn enqueue(
        &self,
        payload: Vec<u8>,
        gas_limit: u64,
        grantee: String,
    ) -> oneshot::Receiver<Result<TxOutcome, SubmitError>> {
        let (tx, rx) = oneshot::channel();
        let request = PendingRequest {
            payload,
            gas_limit,
            grantee,
            resolve: tx,
        };
        self.pending.lock().await.push_back(request);
        rx
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Atomically removes and returns every currently-pending request.
    pub async fn drain(&self) -> Vec<PendingRequest> {
        let mut guard = self.pending.lock().await;
        guard.drain(..).collect()
    }

    /// Re-enqueues postponed requests at the tail, preserving their relative
    /// order so a future drain still sees them roughly FIFO.
    pub async fn requeue(&self, requests: Vec<PendingRequest>) {
        let mut guard = self.pending.lock().await;
        for request in requests {
            guard.push_back(request);
        }
    }
}

impl Default for BroadcastQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::TxOutcome;
    use std::collections::HashMap;

    fn outcome(code: u32) -> TxOutcome {
        TxOutcome {
            code,
            raw_response: "deadbeef".to_string(),
            meta: None,
            events: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn enqueue_then_drain_preserves_fifo_order() {
        let queue = BroadcastQueue::new();
        let _r1 = queue.enqueue(vec![1], 10, "a".to_string()).await;
        let _r2 = queue.enqueue(vec![2], 10, "b".to_string()).await;

        assert!(!queue.is_empty().await);
        let drained = queue.drain().await;
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].grantee, "a");
        assert_eq!(drained[1].grantee, "b");
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn resolve_delivers_outcome_to_receiver() {
        let queue = BroadcastQueue::new();
        let rx = queue.enqueue(vec![1], 10, "a".to_string()).await;
        let mut drained = queue.drain().await;
        let request = drained.remove(0);
        request.resolve(Ok(outcome(0)));

        let result = rx.await.unwrap().unwrap();
        assert_eq!(result.code, 0);
    }

    #[tokio::test]
    async fn resolve_on_dropped_receiver_is_a_silent_noop() {
        let queue = BroadcastQueue::new();
        let rx = queue.enqueue(vec![1], 10, "a".to_string()).await;
        drop(rx);
        let mut drained = queue.drain().await;
        let request = drained.remove(0);
        request.resolve(Ok(outcome(0)));
    }

    #[tokio::test]
    async fn requeue_appends_at_tail_in_order() {
        let queue = BroadcastQueue::new();
        let _r1 = queue.enqueue(vec![1], 10, "a".to_string()).await;
        let mut drained = queue.drain().await;
        let postponed = drained.remove(0);

        let _r2 = queue.enqueue(vec![2], 10, "b".to_string()).await;
        queue.requeue(vec![postponed]).await;

        let drained = queue.drain().await;
        assert_eq!(drained[0].grantee, "b");
        assert_eq!(drained[1].grantee, "a");
    }
}
