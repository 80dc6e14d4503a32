use chrono::{DateTime, Utc};

use crate::chain::lcd::Allowance;
use crate::error::FaucetError;

const STILL_FULL_GRACE: chrono::Duration = chrono::Duration::hours(1);

/// What the HTTP Front-End should do about a given grantee, decided purely
/// from the queried allowance and config (§4.9 Allowance Policy).
pub enum Decision {
    /// No allowance exists yet: enqueue a grant.
    Grant,
    /// An allowance exists but is spent down or about to expire: revoke it,
    /// then grant a fresh one.
    RevokeThenGrant,
}

/// Decides what to do about `existing` (the grantee's current allowance, if
/// any) given the configured allowance amount.
pub fn decide(existing: Option<&Allowance>, allowance_amount: u128) -> Result<Decision, FaucetError> {
    let Some(allowance) = existing else {
        return Ok(Decision::Grant);
    };

    if !allowance.is_basic() {
        return Err(FaucetError::UnsupportedAllowanceType);
    }

    if is_still_full(allowance, allowance_amount) && time_remaining_exceeds_grace(allowance) {
        return Err(FaucetError::AllowanceStillValid);
    }

    Ok(Decision::RevokeThenGrant)
}

fn is_still_full(allowance: &Allowance, allowance_amount: u128) -> bool {
    allowance
        .spend_limit
        .first()
        .and_then(|coin| coin.amount.parse::<u128>().ok())
        .map(|amount| amount == allowance_amount)
        .unwrap_or(false)
}

fn time_remaining_exceeds_grace(allowance: &Allowance) -> bool {
    let Some(expiration) = allowance.expiration.as_deref() else {
        return false;
    };
    let Ok(expiration) = DateTime::parse_from_rfc3339(expiration) else {
        return false;
    };
    expiration.with_timezone(&Utc) - Utc::now() > STILL_FULL_GRACE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::lcd::Coin;

    fn allowance(type_url: &str, amount: &str, expiration: Option<String>) -> Allowance {
        Allowance {
            type_url: type_url.to_string(),
            spend_limit: vec![Coin {
                denom: "uscrt".to_string(),
                amount: amount.to_string(),
            }],
            expiration,
        }
    }

    #[test]
    fn no_existing_allowance_grants() {
        assert!(matches!(decide(None, 1_000_000), Ok(Decision::Grant)));
    }

    #[test]
    fn non_basic_allowance_is_upstream_degraded() {
        let existing = allowance("/cosmos.feegrant.v1beta1.PeriodicAllowance", "0", None);
        assert!(matches!(
            decide(Some(&existing), 1_000_000),
            Err(FaucetError::UnsupportedAllowanceType)
        ));
    }

    #[test]
    fn still_full_with_plenty_of_time_left_is_policy_reject() {
        let far_future = (Utc::now() + chrono::Duration::hours(2)).to_rfc3339();
        let existing = allowance(
            "/cosmos.feegrant.v1beta1.BasicAllowance",
            "1000000",
            Some(far_future),
        );
        assert!(matches!(
            decide(Some(&existing), 1_000_000),
            Err(FaucetError::AllowanceStillValid)
        ));
    }

    #[test]
    fn still_full_but_expiring_soon_revokes_then_grants() {
        let soon = (Utc::now() + chrono::Duration::minutes(30)).to_rfc3339();
        let existing = allowance(
            "/cosmos.feegrant.v1beta1.BasicAllowance",
            "1000000",
            Some(soon),
        );
        assert!(matches!(
            decide(Some(&existing), 1_000_000),
            Ok(Decision::RevokeThenGrant)
        ));
    }

    #[test]
    fn partially_spent_allowance_revokes_then_grants() {
        let far_future = (Utc::now() + chrono::Duration::hours(2)).to_rfc3339();
        let existing = allowance(
            "/cosmos.feegrant.v1beta1.BasicAllowance",
            "500",
            Some(far_future),
        );
        assert!(matches!(
            decide(Some(&existing), 1_000_000),
            Ok(Decision::RevokeThenGrant)
        ));
    }
}
