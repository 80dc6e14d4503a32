use eyre::{eyre, Result};
use std::env;
use std::time::Duration;

/// Environment-derived configuration (§7 of SPEC_FULL.md). There is no config
/// file and no CLI surface: every field below is read once at startup and
/// validated the way the teacher's `DeploymentArtifact::load` validates its
/// JSON artifact.
#[derive(Debug, Clone)]
pub struct FaucetConfig {
    /// Hex-encoded secp256k1 secret key of the granter account (`SERVER_SK`).
    pub server_sk: [u8; 32],
    /// REST (LCD) endpoint base URL (`SECRET_LCD`).
    pub lcd_url: String,
    /// RPC/WebSocket endpoint base URL (`SECRET_RPC`).
    pub rpc_url: String,
    /// Decimal gas price per unit of gas, in `uscrt` (`GAS_PRICE`).
    pub gas_price: f64,
    /// Allowance amount in `uscrt` granted per claim (`ALLOWANCE_AMOUNT`).
    pub allowance_amount: u128,
    /// Optional memo attached to every submitted transaction (`FEEGRANT_MEMO`).
    pub memo: String,
    /// Bind host (`SERVER_HOST`, default `localhost`).
    pub server_host: String,
    /// Bind port (`SERVER_PORT`, default `3001`).
    pub server_port: u16,

    pub chain_id: String,
    pub denom: String,
    pub bech32_hrp: String,
    pub grant_gas_limit: u64,
    pub revoke_gas_limit: u64,
    pub allowance_validity: Duration,
    pub poll_interval: Duration,
}

impl FaucetConfig {
    pub fn from_env() -> Result<Self> {
        let server_sk = parse_server_sk(&require_env("SERVER_SK")?)?;

        let lcd_url = require_env("SECRET_LCD")?;
        validate_url(&lcd_url, "SECRET_LCD")?;

        let rpc_url = require_env("SECRET_RPC")?;
        validate_url(&rpc_url, "SECRET_RPC")?;

        let gas_price: f64 = require_env("GAS_PRICE")?
            .parse()
            .map_err(|e| eyre!("GAS_PRICE must be a decimal number: {e}"))?;
        if !(gas_price.is_finite() && gas_price > 0.0) {
            return Err(eyre!("GAS_PRICE must be a finite positive number"));
        }

        let allowance_amount: u128 = require_env("ALLOWANCE_AMOUNT")?
            .parse()
            .map_err(|e| eyre!("ALLOWANCE_AMOUNT must be a positive integer: {e}"))?;
        if allowance_amount == 0 {
            return Err(eyre!("ALLOWANCE_AMOUNT must be non-zero"));
        }

        let memo = env::var("FEEGRANT_MEMO").unwrap_or_default();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "localhost".to_string());
        let server_port: u16 = env::var("SERVER_PORT")
            .ok()
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| eyre!("SERVER_PORT must be a valid port number: {e}"))?
            .unwrap_or(3001);

        Ok(Self {
            server_sk,
            lcd_url,
            rpc_url,
            gas_price,
            allowance_amount,
            memo,
            server_host,
            server_port,
            chain_id: "secret-4".to_string(),
            denom: "uscrt".to_string(),
            bech32_hrp: "secret".to_string(),
            grant_gas_limit: 15_000,
            revoke_gas_limit: 15_000,
            allowance_validity: Duration::from_secs(24 * 60 * 60),
            poll_interval: Duration::from_secs(6),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| eyre!("missing required environment variable {name}"))
}

fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(eyre!("{name} must begin with http:// or https://"))
    }
}

fn parse_server_sk(raw: &str) -> Result<[u8; 32]> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    if stripped.len() != 64 {
        return Err(eyre!(
            "SERVER_SK must be exactly 64 hex digits (optionally 0x-prefixed), got {}",
            stripped.len()
        ));
    }
    let bytes = hex::decode(stripped).map_err(|e| eyre!("SERVER_SK is not valid hex: {e}"))?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_server_sk_accepts_0x_prefix() {
        let raw = format!("0x{}", "11".repeat(32));
        let key = parse_server_sk(&raw).unwrap();
        assert_eq!(key, [0x11u8; 32]);
    }

    #[test]
    fn parse_server_sk_rejects_wrong_length() {
        assert!(parse_server_sk("abcd").is_err());
    }

    #[test]
    fn parse_server_sk_rejects_non_hex() {
        let raw = "zz".repeat(32);
        assert!(parse_server_sk(&raw).is_err());
    }

    #[test]
    fn validate_url_rejects_missing_scheme() {
        assert!(validate_url("secret-4.api.example.com", "SECRET_LCD").is_err());
        assert!(validate_url("https://secret-4.api.example.com", "SECRET_LCD").is_ok());
    }
}
