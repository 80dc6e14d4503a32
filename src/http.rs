use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::chain::address::Address;
use crate::chain::messages;
use crate::chain::{ChainGateway, TxMeta};
use crate::config::FaucetConfig;
use crate::error::FaucetError;
use crate::policy::{self, Decision};
use crate::queue::BroadcastQueue;

/// Shared handle every HTTP handler closes over: the chain gateway (for
/// allowance queries), the queue (to enqueue grant/revoke messages), and the
/// static config values the policy/codec need.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ChainGateway>,
    pub queue: BroadcastQueue,
    pub config: Arc<FaucetConfig>,
}

/// The HTTP surface (§6): `OPTIONS`/`GET /claim/:address`, `POST /claim`.
/// CORS is intentionally narrower than a blanket permissive layer — only
/// `GET` is advertised in `access-control-allow-methods`, even on the `POST`
/// route, matching the documented external interface.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/claim/:address", get(claim_get).options(claim_options))
        .route("/claim", post(claim_post))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn claim_options() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

async fn claim_get(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, FaucetError> {
    claim(state, address).await
}

#[derive(Deserialize)]
struct ClaimBody {
    address: String,
}

async fn claim_post(
    State(state): State<AppState>,
    Json(body): Json<ClaimBody>,
) -> Result<impl IntoResponse, FaucetError> {
    claim(state, body.address).await
}

#[derive(Serialize)]
struct ClaimResponse {
    meta: Option<TxMeta>,
    events: HashMap<String, Vec<String>>,
}

/// `POST /claim` and `GET /claim/:address` share this handler and therefore
/// have identical semantics by construction (§11 Open Question #4).
async fn claim(state: AppState, raw_address: String) -> Result<impl IntoResponse, FaucetError> {
    let grantee =
        Address::parse(&raw_address, &state.config.bech32_hrp).map_err(|_| FaucetError::InvalidAddress)?;

    let existing = state.gateway.query_allowance(grantee.as_str()).await?;
    let decision = policy::decide(existing.as_ref(), state.config.allowance_amount)?;

    let granter_id = parse_account_id(state.gateway.granter())?;
    let grantee_id = parse_account_id(grantee.as_str())?;

    if matches!(decision, Decision::RevokeThenGrant) {
        let payload = messages::encode_revoke(&granter_id, &grantee_id)?;
        let outcome = await_submission(&state.queue, payload, state.config.revoke_gas_limit, &grantee)
            .await?;
        if !outcome.success() {
            return Err(FaucetError::RevocationFailed(outcome));
        }
    }

    let payload = messages::encode_grant(
        &granter_id,
        &grantee_id,
        &state.config.denom,
        state.config.allowance_amount,
        state.config.allowance_validity,
    )?;
    let outcome = await_submission(&state.queue, payload, state.config.grant_gas_limit, &grantee).await?;
    if !outcome.success() {
        return Err(FaucetError::GrantFailed(outcome));
    }

    Ok(Json(ClaimResponse {
        meta: outcome.meta,
        events: outcome.events,
    }))
}

async fn await_submission(
    queue: &BroadcastQueue,
    payload: Vec<u8>,
    gas_limit: u64,
    grantee: &Address,
) -> Result<crate::chain::TxOutcome, FaucetError> {
    let rx = queue
        .enqueue(payload, gas_limit, grantee.as_str().to_string())
        .await;
    rx.await
        .map_err(|_| FaucetError::SubmissionFailed("queue dropped the request".to_string()))?
        .map_err(|e| FaucetError::SubmissionFailed(e.0))
}

fn parse_account_id(s: &str) -> Result<cosmrs::AccountId, FaucetError> {
    s.parse().map_err(|_| FaucetError::InvalidAddress)
}
