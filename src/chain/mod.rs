//! Everything that talks to the chain: signing, broadcast, LCD queries and
//! the block-event subscription. Grouped here the way the teacher groups its
//! on-chain collaborators (`opensub.rs`, `erc20.rs`) behind a small surface
//! the rest of the crate depends on.

pub mod address;
pub mod events;
pub mod gateway;
pub mod lcd;
pub mod messages;
pub mod wallet;

pub use address::Address;
pub use events::BlockEventSource;
pub use gateway::{ChainGateway, GatewayPort};
pub use wallet::Wallet;

use serde::Serialize;
use std::collections::HashMap;

/// The result of a broadcast, whether it succeeded or failed on-chain.
///
/// `code == 0` is success; anything else is a chain-level failure the caller
/// must interpret (see [`meta`](TxOutcome::meta) for the parsed codespace/log).
#[derive(Debug, Clone, Serialize)]
pub struct TxOutcome {
    pub code: u32,
    pub raw_response: String,
    pub meta: Option<TxMeta>,
    pub events: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TxMeta {
    pub codespace: Option<String>,
    pub code: Option<u32>,
    pub log: Option<String>,
}

impl TxOutcome {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// True for the specific `sdk`-codespace, code-32 "account sequence
    /// mismatch" failure the Submitter retries on.
    pub fn is_sequence_mismatch(&self) -> bool {
        self.code != 0
            && self
                .meta
                .as_ref()
                .map(|m| m.codespace.as_deref() == Some("sdk") && m.code == Some(32))
                .unwrap_or(false)
    }
}

/// Failure surfaced when a submission throws before a `TxOutcome` could be
/// produced at all (network error, signing error, etc).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct SubmitError(pub String);
