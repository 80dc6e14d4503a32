use std::collections::HashSet;

use crate::queue::PendingRequest;

/// One message slated for inclusion in the next transaction, paired with the
/// request(s) it resolves. `sources` holds every drained request whose
/// payload matched this entry (the first claims the slot; duplicates ride
/// along and are resolved with the same outcome, per invariant 5).
pub struct BatchEntry {
    pub payload: Vec<u8>,
    pub gas_limit: u64,
}

/// Output of draining the queue and running the dedupe/conflict-avoidance
/// algorithm (§4.3 Batch Builder).
pub struct Batch {
    pub entries: Vec<BatchEntry>,
    pub total_gas_limit: u64,
    /// Every drained request, in original order, annotated with whether it
    /// made it into `entries` or was postponed. The Submitter resolves all
    /// of these (including duplicates), and re-enqueues the postponed ones.
    pub resolutions: Vec<Resolution>,
}

pub enum Resolution {
    Included(PendingRequest),
    Postponed(PendingRequest),
}

/// Drains a snapshot of the queue into a batch: dedupe by canonical payload
/// bytes, postpone same-batch grantee collisions (§4.3, unchanged from the
/// distilled spec).
///
/// Gas is summed across the *entire* drained snapshot, including duplicates
/// and postponed requests — a deliberate over-reservation kept from the
/// source behavior (see DESIGN.md Open Question #1).
pub fn build_batch(drained: Vec<PendingRequest>) -> Batch {
    let mut seen_payloads: HashSet<Vec<u8>> = HashSet::new();
    let mut claimed_grantees: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();
    let mut resolutions = Vec::new();
    let mut total_gas_limit: u64 = 0;

    for request in drained {
        total_gas_limit = total_gas_limit.saturating_add(request.gas_limit);

        if seen_payloads.contains(&request.payload) {
            // Duplicate payload: dropped from the batch but still resolved
            // from the batch's eventual outcome.
            resolutions.push(Resolution::Included(request));
            continue;
        }

        if claimed_grantees.contains(&request.grantee) {
            resolutions.push(Resolution::Postponed(request));
            continue;
        }

        seen_payloads.insert(request.payload.clone());
        claimed_grantees.insert(request.grantee.clone());
        entries.push(BatchEntry {
            payload: request.payload.clone(),
            gas_limit: request.gas_limit,
        });
        resolutions.push(Resolution::Included(request));
    }

    Batch {
        entries,
        total_gas_limit,
        resolutions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::TxOutcome;
    use tokio::sync::oneshot;

    fn request(payload: &[u8], grantee: &str, gas: u64) -> PendingRequest {
        let (tx, _rx) = oneshot::channel::<Result<TxOutcome, crate::chain::SubmitError>>();
        PendingRequest {
            payload: payload.to_vec(),
            gas_limit: gas,
            grantee: grantee.to_string(),
            resolve: tx,
        }
    }

    #[test]
    fn distinct_grantees_and_payloads_all_included() {
        let batch = build_batch(vec![
            request(b"a", "alice", 10),
            request(b"b", "bob", 10),
        ]);
        assert_eq!(batch.entries.len(), 2);
        assert_eq!(batch.total_gas_limit, 20);
    }

    #[test]
    fn duplicate_payload_is_dropped_from_entries_but_still_resolved() {
        let batch = build_batch(vec![
            request(b"a", "alice", 10),
            request(b"a", "alice-again", 10),
        ]);
        assert_eq!(batch.entries.len(), 1);
        assert_eq!(batch.total_gas_limit, 20);
        assert_eq!(batch.resolutions.len(), 2);
    }

    #[test]
    fn same_grantee_collision_is_postponed() {
        let batch = build_batch(vec![
            request(b"a", "alice", 10),
            request(b"b", "alice", 10),
        ]);
        assert_eq!(batch.entries.len(), 1);
        assert!(matches!(batch.resolutions[0], Resolution::Included(_)));
        assert!(matches!(batch.resolutions[1], Resolution::Postponed(_)));
    }

    #[test]
    fn empty_drain_produces_empty_batch() {
        let batch = build_batch(vec![]);
        assert!(batch.entries.is_empty());
        assert_eq!(batch.total_gas_limit, 0);
    }
}
