use eyre::{eyre, Result};

/// A validated bech32 account address (§4.8 Address Validator).
///
/// The inner string is the original bech32 encoding; validity is checked
/// once at construction and never re-derived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Address(String);

impl Address {
    /// Decode and validate `raw` against `hrp` with the standard 20-byte
    /// account-id payload length. Returns `Error::InvalidAddress`-equivalent
    /// (`eyre::Report`; callers at the HTTP boundary map it to
    /// [`crate::error::FaucetError::InvalidAddress`]).
    pub fn parse(raw: &str, hrp: &str) -> Result<Self> {
        let (decoded_hrp, data, _variant) =
            bech32::decode(raw).map_err(|e| eyre!("invalid bech32 address: {e}"))?;
        if decoded_hrp != hrp {
            return Err(eyre!(
                "address has hrp '{decoded_hrp}', expected '{hrp}'"
            ));
        }
        let payload = bech32::FromBase32::from_base32(&data)
            .map_err(|e| eyre!("invalid bech32 payload: {e}"))?;
        let payload: Vec<u8> = payload;
        if payload.len() != 20 {
            return Err(eyre!(
                "address payload must be 20 bytes, got {}",
                payload.len()
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
