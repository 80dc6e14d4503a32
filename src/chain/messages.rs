//! Builds and decodes the `cosmrs::feegrant` messages that flow through the
//! queue as opaque protobuf-`Any`-encoded bytes (§4.7 Message Codec).
//!
//! The queue never holds a typed message — only `Vec<u8>` — so that the
//! Broadcast Queue and Batch Builder stay agnostic to what kind of message
//! they're carrying. Encoding happens once, at enqueue time; decoding happens
//! once, when the Submitter assembles a tx body.

use cosmrs::feegrant::{BasicAllowance, MsgGrantAllowance, MsgRevokeAllowance};
use cosmrs::tx::Msg;
use cosmrs::{AccountId, Any, Coin};
use eyre::{eyre, Result};
use prost::Message as ProstMessage;
use std::time::{Duration, SystemTime};

pub const BASIC_ALLOWANCE_TYPE_URL: &str = "/cosmos.feegrant.v1beta1.BasicAllowance";

/// Builds a `MsgGrantAllowance` carrying a fresh `BasicAllowance`, and
/// returns its `Any`-encoded bytes (the Broadcast Queue's `payload`).
pub fn encode_grant(
    granter: &AccountId,
    grantee: &AccountId,
    denom: &str,
    amount: u128,
    validity: Duration,
) -> Result<Vec<u8>> {
    let expiration = SystemTime::now()
        .checked_add(validity)
        .ok_or_else(|| eyre!("allowance validity overflowed SystemTime"))?;

    let allowance = BasicAllowance {
        spend_limit: vec![Coin {
            denom: denom.parse().map_err(|e| eyre!("invalid denom: {e}"))?,
            amount,
        }],
        expiration: Some(expiration.into()),
    };

    let msg = MsgGrantAllowance {
        granter: granter.clone(),
        grantee: grantee.clone(),
        allowance: Some(allowance.to_any().map_err(|e| eyre!("encode allowance: {e}"))?),
    };

    encode_any(msg.to_any().map_err(|e| eyre!("encode MsgGrantAllowance: {e}"))?)
}

/// Builds a `MsgRevokeAllowance` and returns its `Any`-encoded bytes.
pub fn encode_revoke(granter: &AccountId, grantee: &AccountId) -> Result<Vec<u8>> {
    let msg = MsgRevokeAllowance {
        granter: granter.clone(),
        grantee: grantee.clone(),
    };
    encode_any(msg.to_any().map_err(|e| eyre!("encode MsgRevokeAllowance: {e}"))?)
}

fn encode_any(any: Any) -> Result<Vec<u8>> {
    Ok(any.encode_to_vec())
}

/// Decodes a payload produced by [`encode_grant`]/[`encode_revoke`] back into
/// an `Any` for inclusion in a transaction body.
pub fn decode_payload(payload: &[u8]) -> Result<Any> {
    Any::decode(payload).map_err(|e| eyre!("payload is not a valid Any: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn account(s: &str) -> AccountId {
        AccountId::from_str(s).unwrap()
    }

    #[test]
    fn encode_grant_round_trips_through_any() {
        let granter = account("secret1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqrfsl3u");
        let grantee = account("secret1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqrfsl3u");
        let bytes = encode_grant(
            &granter,
            &grantee,
            "uscrt",
            1_000_000,
            Duration::from_secs(86_400),
        )
        .unwrap();
        let any = decode_payload(&bytes).unwrap();
        assert_eq!(any.type_url, MsgGrantAllowance::type_url());
    }

    #[test]
    fn encode_revoke_round_trips_through_any() {
        let granter = account("secret1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqrfsl3u");
        let grantee = account("secret1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqrfsl3u");
        let bytes = encode_revoke(&granter, &grantee).unwrap();
        let any = decode_payload(&bytes).unwrap();
        assert_eq!(any.type_url, MsgRevokeAllowance::type_url());
    }
}
