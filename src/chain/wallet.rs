use cosmrs::crypto::secp256k1::SigningKey;
use cosmrs::AccountId;
use eyre::{eyre, Result};

/// The server's single signing identity. There is exactly one of these per
/// process — the granter account whose sequence number paces every batch.
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    account_id: AccountId,
}

impl Wallet {
    pub fn from_secret_key(server_sk: &[u8; 32], hrp: &str) -> Result<Self> {
        let signing_key =
            SigningKey::from_slice(server_sk).map_err(|e| eyre!("invalid SERVER_SK: {e}"))?;
        let account_id = signing_key
            .public_key()
            .account_id(hrp)
            .map_err(|e| eyre!("failed to derive account id: {e}"))?;
        Ok(Self {
            signing_key,
            account_id,
        })
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}
