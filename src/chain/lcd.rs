use eyre::{eyre, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::chain::messages::BASIC_ALLOWANCE_TYPE_URL;

/// The external shape the Allowance Policy reads (§3 Allowance, new ambient
/// type): normalized out of the LCD's `@type`-tagged JSON so callers never
/// touch raw `Value`s.
#[derive(Debug, Clone)]
pub struct Allowance {
    pub type_url: String,
    pub spend_limit: Vec<Coin>,
    pub expiration: Option<String>,
}

impl Allowance {
    pub fn is_basic(&self) -> bool {
        self.type_url == BASIC_ALLOWANCE_TYPE_URL
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

/// `GET {base}/cosmos/auth/v1beta1/accounts/{address}` result, just the two
/// fields the Submitter needs to build a `SignerInfo`.
#[derive(Debug, Clone, Copy)]
pub struct AuthInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// Thin `reqwest`-based REST client for the chain's LCD, in the same
/// JSON-RPC-adjacent style as the teacher's `PaymasterClient` (request,
/// check status, pull out the field we actually want).
#[derive(Debug, Clone)]
pub struct LcdClient {
    base_url: String,
    http: reqwest::Client,
}

impl LcdClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Returns `None` on a 404 (no allowance exists yet), matching the LCD's
    /// contract for a missing grant.
    pub async fn query_allowance(&self, granter: &str, grantee: &str) -> Result<Option<Allowance>> {
        let url = format!(
            "{}/cosmos/feegrant/v1beta1/allowance/{granter}/{grantee}",
            self.base_url
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = resp.status();
        let body: Value = resp.json().await.context("failed to decode allowance JSON")?;
        if !status.is_success() {
            return Err(eyre!("LCD returned {status}: {body}"));
        }

        let allowance = body
            .get("allowance")
            .and_then(|a| a.get("allowance"))
            .ok_or_else(|| eyre!("missing allowance.allowance field"))?;

        let type_url = allowance
            .get("@type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| eyre!("missing @type field"))?
            .to_string();

        let spend_limit: Vec<Coin> = allowance
            .get("spend_limit")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .context("invalid spend_limit")?
            .unwrap_or_default();

        let expiration = allowance
            .get("expiration")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(Some(Allowance {
            type_url,
            spend_limit,
            expiration,
        }))
    }

    pub async fn fetch_auth(&self, address: &str) -> Result<AuthInfo> {
        let url = format!("{}/cosmos/auth/v1beta1/accounts/{address}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status();
        let body: Value = resp.json().await.context("failed to decode account JSON")?;
        if !status.is_success() {
            return Err(eyre!("LCD returned {status}: {body}"));
        }

        let account = body
            .get("account")
            .ok_or_else(|| eyre!("missing account field"))?;

        let account_number = parse_u64_field(account, "account_number")?;
        let sequence = parse_u64_field(account, "sequence")?;

        Ok(AuthInfo {
            account_number,
            sequence,
        })
    }
}

fn parse_u64_field(value: &Value, field: &str) -> Result<u64> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| eyre!("missing {field} field"))?
        .parse()
        .map_err(|e| eyre!("invalid {field}: {e}"))
}
