use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::chain::TxOutcome;

/// Client-facing failure kinds (§7/§9 of SPEC_FULL.md).
///
/// Anything that happens before a request reaches the queue (bad input, policy
/// rejection, a degraded upstream) is represented directly here. Anything that
/// happens *after* enqueue is carried as a [`TxOutcome`] inside the relevant
/// variant, since the submitter has already produced a chain-level result.
#[derive(Debug, thiserror::Error)]
pub enum FaucetError {
    #[error("invalid bech32 address")]
    InvalidAddress,

    #[error("existing feegrant is full and hasn't expired yet")]
    AllowanceStillValid,

    #[error("existing feegrant is not a basic allowance")]
    UnsupportedAllowanceType,

    #[error("revocation failed")]
    RevocationFailed(TxOutcome),

    #[error("grant broadcast failed")]
    GrantFailed(TxOutcome),

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("internal error: {0}")]
    Internal(#[from] eyre::Report),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct ChainFailureBody {
    error: String,
    response: TxOutcome,
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        match self {
            FaucetError::InvalidAddress => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "Invalid bech32 address".to_string(),
                }),
            )
                .into_response(),
            FaucetError::AllowanceStillValid => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "Existing feegrant is full and hasn't expired yet".to_string(),
                }),
            )
                .into_response(),
            FaucetError::UnsupportedAllowanceType => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Existing feegrant is not a basic allowance".to_string(),
                }),
            )
                .into_response(),
            FaucetError::RevocationFailed(outcome) => (
                StatusCode::from_u16(425).expect("425 is a valid status code"),
                Json(ChainFailureBody {
                    error: "Revocation failed".to_string(),
                    response: outcome,
                }),
            )
                .into_response(),
            FaucetError::GrantFailed(outcome) => (
                StatusCode::from_u16(550).expect("550 is a valid status code"),
                Json(ChainFailureBody {
                    error: "Grant broadcast failed".to_string(),
                    response: outcome,
                }),
            )
                .into_response(),
            FaucetError::SubmissionFailed(reason) => {
                tracing::error!(reason = %reason, "submission threw before broadcast");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody { error: reason }),
                )
                    .into_response()
            }
            FaucetError::Internal(report) => {
                tracing::error!(error = %report, "internal error handling claim");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "internal error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}
