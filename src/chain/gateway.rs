use std::collections::HashMap;

use async_trait::async_trait;
use cosmrs::tx::{self, Fee, SignDoc, SignerInfo};
use cosmrs::{Any, Coin};
use eyre::{eyre, Result};
use tendermint_rpc::{Client, HttpClient};

use crate::chain::lcd::{Allowance, AuthInfo, LcdClient};
use crate::chain::wallet::Wallet;
use crate::chain::{SubmitError, TxMeta, TxOutcome};

/// The three chain operations the Submitter's sign/broadcast/retry loop
/// actually drives, pulled out of [`ChainGateway`] so tests can inject a
/// fake chain in place of a live `tendermint-rpc`/LCD round-trip.
#[async_trait]
pub trait GatewayPort: Send + Sync {
    async fn fetch_auth(&self) -> Result<AuthInfo>;

    fn sign_tx_direct(
        &self,
        messages: Vec<Any>,
        gas_limit: u64,
        memo: &str,
        auth: AuthInfo,
    ) -> Result<Vec<u8>>;

    async fn broadcast_tx_commit(&self, tx_bytes: Vec<u8>) -> Result<TxOutcome, SubmitError>;
}

/// The one thing every other component depends on to actually talk to the
/// chain: sign, broadcast, and query allowances/auth (§4 C1 Chain Gateway).
/// Combines a `cosmrs` signer, a `reqwest` LCD client, and a
/// `tendermint-rpc` broadcast client behind a single surface.
#[derive(Clone)]
pub struct ChainGateway {
    wallet: Wallet,
    lcd: LcdClient,
    rpc: HttpClient,
    chain_id: tendermint::chain::Id,
    denom: String,
    gas_price: f64,
}

impl ChainGateway {
    pub fn new(
        wallet: Wallet,
        lcd_url: String,
        rpc_url: String,
        chain_id: &str,
        denom: String,
        gas_price: f64,
    ) -> Result<Self> {
        let rpc = HttpClient::new(rpc_url.as_str())
            .map_err(|e| eyre!("failed to construct rpc client for {rpc_url}: {e}"))?;
        let chain_id = chain_id
            .parse()
            .map_err(|e| eyre!("invalid chain id {chain_id}: {e}"))?;
        Ok(Self {
            wallet,
            lcd: LcdClient::new(lcd_url),
            rpc,
            chain_id,
            denom,
            gas_price,
        })
    }

    pub fn granter(&self) -> &str {
        self.wallet.account_id().as_ref()
    }

    pub async fn query_allowance(&self, grantee: &str) -> Result<Option<Allowance>> {
        self.lcd.query_allowance(self.granter(), grantee).await
    }

    pub async fn fetch_auth(&self) -> Result<AuthInfo> {
        self.lcd.fetch_auth(self.granter()).await
    }

    /// Signs a direct transaction over `messages` with the given fee
    /// parameters, using an explicit `(account_number, sequence)` pair so the
    /// Submitter's sequence-mismatch retry can override it without a second
    /// auth round-trip.
    pub fn sign_tx_direct(
        &self,
        messages: Vec<Any>,
        gas_limit: u64,
        memo: &str,
        auth: AuthInfo,
    ) -> Result<Vec<u8>> {
        let fee_amount = (gas_limit as f64 * self.gas_price) as u128;
        let fee = Fee::from_amount_and_gas(
            Coin {
                denom: self.denom.parse().map_err(|e| eyre!("invalid denom: {e}"))?,
                amount: fee_amount,
            },
            gas_limit,
        );

        let body = tx::Body::new(messages, memo, 0u32);
        let auth_info =
            SignerInfo::single_direct(Some(self.wallet.signing_key().public_key()), auth.sequence)
                .auth_info(fee);

        let sign_doc = SignDoc::new(&body, &auth_info, &self.chain_id, auth.account_number)
            .map_err(|e| eyre!("failed to build sign doc: {e}"))?;

        let raw = sign_doc
            .sign(self.wallet.signing_key())
            .map_err(|e| eyre!("failed to sign transaction: {e}"))?;

        raw.to_bytes()
            .map_err(|e| eyre!("failed to serialize signed transaction: {e}"))
    }

    /// Broadcasts and blocks until the transaction is included in a block,
    /// mapping the response into a [`TxOutcome`]. Network/encoding failures
    /// become [`SubmitError`], which the caller propagates to every pending
    /// request's future rather than retrying.
    pub async fn broadcast_tx_commit(&self, tx_bytes: Vec<u8>) -> Result<TxOutcome, SubmitError> {
        let response = self
            .rpc
            .broadcast_tx_commit(tx_bytes)
            .await
            .map_err(|e| SubmitError(format!("broadcast failed: {e}")))?;

        let (code, log) = if response.check_tx.code.is_err() {
            (
                u32::from(response.check_tx.code),
                response.check_tx.log.clone(),
            )
        } else {
            (
                u32::from(response.deliver_tx.code),
                response.deliver_tx.log.clone(),
            )
        };

        let meta = if code != 0 {
            Some(TxMeta {
                codespace: Some(if response.check_tx.code.is_err() {
                    response.check_tx.codespace.clone()
                } else {
                    response.deliver_tx.codespace.clone()
                }),
                code: Some(code),
                log: Some(log.clone()),
            })
        } else {
            None
        };

        let mut events: HashMap<String, Vec<String>> = HashMap::new();
        for ev in response
            .check_tx
            .events
            .iter()
            .chain(response.deliver_tx.events.iter())
        {
            let entry = events.entry(ev.kind.clone()).or_default();
            for attr in &ev.attributes {
                entry.push(format!("{}={}", attr.key_str().unwrap_or(""), attr.value_str().unwrap_or("")));
            }
        }

        Ok(TxOutcome {
            code,
            raw_response: format!("{:?}", response.hash),
            meta,
            events,
        })
    }
}

#[async_trait]
impl GatewayPort for ChainGateway {
    async fn fetch_auth(&self) -> Result<AuthInfo> {
        ChainGateway::fetch_auth(self).await
    }

    fn sign_tx_direct(
        &self,
        messages: Vec<Any>,
        gas_limit: u64,
        memo: &str,
        auth: AuthInfo,
    ) -> Result<Vec<u8>> {
        ChainGateway::sign_tx_direct(self, messages, gas_limit, memo, auth)
    }

    async fn broadcast_tx_commit(&self, tx_bytes: Vec<u8>) -> Result<TxOutcome, SubmitError> {
        ChainGateway::broadcast_tx_commit(self, tx_bytes).await
    }
}
