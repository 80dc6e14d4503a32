use std::sync::Arc;

use tracing::{error, warn};

use crate::batch::{Batch, Resolution};
use crate::chain::messages::decode_payload;
use crate::chain::{lcd::AuthInfo, GatewayPort, SubmitError};
use crate::queue::{BroadcastQueue, PendingRequest};
use crate::seqparser::parse_expected_sequence;

const MAX_SEQUENCE_RETRIES: u32 = 2;

/// Signs, broadcasts, and resolves one batch (§4.4 Submitter). Depends on
/// [`GatewayPort`] rather than the concrete `ChainGateway` so the
/// sign/broadcast/retry loop can be driven against a fake chain in tests.
pub struct Submitter {
    gateway: Arc<dyn GatewayPort>,
    queue: BroadcastQueue,
    memo: String,
}

impl Submitter {
    pub fn new(gateway: Arc<dyn GatewayPort>, queue: BroadcastQueue, memo: String) -> Self {
        Self {
            gateway,
            queue,
            memo,
        }
    }

    /// Consumes a batch produced by [`crate::batch::build_batch`], resolving
    /// every request's future exactly once and re-enqueuing postponed
    /// requests, unless the catastrophic path fires (in which case nothing
    /// is re-enqueued — see §4.4 step 6).
    pub async fn submit(&self, batch: Batch) {
        let Batch {
            entries,
            total_gas_limit,
            resolutions,
        } = batch;

        if entries.is_empty() {
            return;
        }

        let messages = match entries
            .iter()
            .map(|e| decode_payload(&e.payload))
            .collect::<eyre::Result<Vec<_>>>()
        {
            Ok(messages) => messages,
            Err(e) => {
                self.fail_all(resolutions, &format!("failed to decode queued payload: {e}"));
                return;
            }
        };

        let mut auth = match self.gateway.fetch_auth().await {
            Ok(auth) => auth,
            Err(e) => {
                self.fail_all(resolutions, &format!("failed to fetch account info: {e}"));
                return;
            }
        };

        let mut retries = 0u32;
        loop {
            let tx_bytes = match self.gateway.sign_tx_direct(
                messages.clone(),
                total_gas_limit,
                &self.memo,
                auth,
            ) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.fail_all(resolutions, &format!("failed to sign transaction: {e}"));
                    return;
                }
            };

            let outcome = match self.gateway.broadcast_tx_commit(tx_bytes).await {
                Ok(outcome) => outcome,
                Err(SubmitError(reason)) => {
                    self.fail_all(resolutions, &reason);
                    return;
                }
            };

            if outcome.is_sequence_mismatch() && retries < MAX_SEQUENCE_RETRIES {
                let parsed = outcome
                    .meta
                    .as_ref()
                    .and_then(|m| m.log.as_deref())
                    .and_then(parse_expected_sequence);

                if let Some(expected_sequence) = parsed {
                    retries += 1;
                    warn!(
                        retries,
                        expected_sequence, "sequence mismatch; retrying with corrected sequence"
                    );
                    auth = match self.gateway.fetch_auth().await {
                        Ok(refreshed) => AuthInfo {
                            account_number: refreshed.account_number,
                            sequence: expected_sequence,
                        },
                        Err(e) => {
                            self.fail_all(
                                resolutions,
                                &format!("failed to refresh account info: {e}"),
                            );
                            return;
                        }
                    };
                    continue;
                }
            }

            self.resolve_and_requeue(resolutions, outcome).await;
            return;
        }
    }

    fn fail_all(&self, resolutions: Vec<Resolution>, reason: &str) {
        error!(reason, "submission failed before a tx outcome was produced");
        for resolution in resolutions {
            let request = into_request(resolution);
            request.resolve(Err(SubmitError(reason.to_string())));
        }
    }

    async fn resolve_and_requeue(
        &self,
        resolutions: Vec<Resolution>,
        outcome: crate::chain::TxOutcome,
    ) {
        let mut postponed = Vec::new();
        for resolution in resolutions {
            match resolution {
                Resolution::Included(request) => request.resolve(Ok(outcome.clone())),
                Resolution::Postponed(request) => postponed.push(request),
            }
        }
        if !postponed.is_empty() {
            self.queue.requeue(postponed).await;
        }
    }
}

fn into_request(resolution: Resolution) -> PendingRequest {
    match resolution {
        Resolution::Included(request) | Resolution::Postponed(request) => request,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::*;
    use crate::chain::messages::encode_grant;
    use crate::chain::{TxMeta, TxOutcome};

    #[test]
    fn max_sequence_retries_is_two() {
        assert_eq!(MAX_SEQUENCE_RETRIES, 2);
    }

    /// Stands in for the chain gateway in submitter tests: `fetch_auth` and
    /// `sign_tx_direct` always succeed, `broadcast_tx_commit` replays a
    /// scripted sequence of outcomes, one per call.
    struct FakeGateway {
        outcomes: std::sync::Mutex<Vec<Result<TxOutcome, SubmitError>>>,
        calls: AtomicUsize,
        seen_sequences: std::sync::Mutex<Vec<u64>>,
    }

    impl FakeGateway {
        fn new(outcomes: Vec<Result<TxOutcome, SubmitError>>) -> Self {
            Self {
                outcomes: std::sync::Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
                seen_sequences: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GatewayPort for FakeGateway {
        async fn fetch_auth(&self) -> eyre::Result<AuthInfo> {
            Ok(AuthInfo {
                account_number: 7,
                sequence: 1,
            })
        }

        fn sign_tx_direct(
            &self,
            _messages: Vec<cosmrs::Any>,
            _gas_limit: u64,
            _memo: &str,
            auth: AuthInfo,
        ) -> eyre::Result<Vec<u8>> {
            self.seen_sequences.lock().unwrap().push(auth.sequence);
            Ok(vec![0u8; 4])
        }

        async fn broadcast_tx_commit(&self, _tx_bytes: Vec<u8>) -> Result<TxOutcome, SubmitError> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes.lock().unwrap()[idx].clone()
        }
    }

    fn sequence_mismatch(expected: u64) -> TxOutcome {
        TxOutcome {
            code: 32,
            raw_response: "deadbeef".to_string(),
            meta: Some(TxMeta {
                codespace: Some("sdk".to_string()),
                code: Some(32),
                log: Some(format!(
                    "account sequence mismatch, expected {expected}, got 1"
                )),
            }),
            events: Default::default(),
        }
    }

    fn success() -> TxOutcome {
        TxOutcome {
            code: 0,
            raw_response: "cafebabe".to_string(),
            meta: None,
            events: Default::default(),
        }
    }

    fn one_entry_batch() -> (Batch, oneshot::Receiver<Result<TxOutcome, SubmitError>>) {
        let address = "secret1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqrfsl3u"
            .parse()
            .unwrap();
        let payload = encode_grant(
            &address,
            &address,
            "uscrt",
            1_000_000,
            std::time::Duration::from_secs(86_400),
        )
        .expect("encode_grant should succeed with a valid account id");

        let (resolve, rx) = oneshot::channel();
        let request = crate::queue::PendingRequest {
            payload: payload.clone(),
            gas_limit: 200_000,
            grantee: "secret1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqrfsl3u".to_string(),
            resolve,
        };
        let batch = Batch {
            entries: vec![crate::batch::BatchEntry {
                payload,
                gas_limit: request.gas_limit,
            }],
            total_gas_limit: request.gas_limit,
            resolutions: vec![Resolution::Included(request)],
        };
        (batch, rx)
    }

    #[tokio::test]
    async fn sequence_mismatch_retries_with_parsed_sequence_and_succeeds() {
        let gateway = Arc::new(FakeGateway::new(vec![
            Ok(sequence_mismatch(42)),
            Ok(success()),
        ]));
        let submitter = Submitter::new(
            gateway.clone() as Arc<dyn GatewayPort>,
            BroadcastQueue::new(),
            "memo".to_string(),
        );

        let (batch, rx) = one_entry_batch();
        submitter.submit(batch).await;

        let outcome = rx.await.unwrap().unwrap();
        assert!(outcome.success());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*gateway.seen_sequences.lock().unwrap(), vec![1, 42]);
    }

    #[tokio::test]
    async fn three_consecutive_sequence_mismatches_surface_as_failure() {
        let gateway = Arc::new(FakeGateway::new(vec![
            Ok(sequence_mismatch(2)),
            Ok(sequence_mismatch(3)),
            Ok(sequence_mismatch(4)),
        ]));
        let submitter = Submitter::new(
            gateway.clone() as Arc<dyn GatewayPort>,
            BroadcastQueue::new(),
            "memo".to_string(),
        );

        let (batch, rx) = one_entry_batch();
        submitter.submit(batch).await;

        let outcome = rx.await.unwrap().unwrap();
        assert!(!outcome.success());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    }
}
