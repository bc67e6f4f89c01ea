//! Funding account signer
//!
//! SECURITY: This is the ONLY place the funding secret exists.
//! - The seed is read through `secrecy` and dropped once the key is built
//! - Keys are never serialized or logged
//! - Only signatures and the public key leave this module

use crate::ledger::{DecoratedSignature, SignedTransaction, Transaction};
use crate::{Error, Result};
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use secrecy::{ExposeSecret, SecretString};

/// Ed25519 signer for the account that pays for deployments and calls
pub struct FundingSigner {
    signing_key: SigningKey,
    /// Ledger account id of the funding account (safe to expose)
    account_id: String,
}

impl FundingSigner {
    /// Create a signer from an environment variable holding a hex seed
    pub fn from_env(var_name: &str, account_id: impl Into<String>) -> Result<Self> {
        let seed = std::env::var(var_name).map_err(|_| {
            Error::Config(format!(
                "Environment variable {} not set. Required for the funding signer.",
                var_name
            ))
        })?;
        Self::from_secret(&SecretString::from(seed), account_id)
    }

    /// Create a signer from a hex-encoded 32-byte seed
    pub fn from_secret(seed: &SecretString, account_id: impl Into<String>) -> Result<Self> {
        let raw = seed.expose_secret();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(raw.trim())
            .map_err(|_| Error::Config("Funding secret must be hex encoded".to_string()))?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Config("Funding secret must be 32 bytes".to_string()))?;

        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
            account_id: account_id.into(),
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Public key as hex
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key().as_bytes())
    }

    /// Hint identifying this key in a decorated signature
    fn hint(&self) -> String {
        let bytes = self.verifying_key().to_bytes();
        hex::encode(&bytes[28..])
    }

    /// Sign a transaction hash
    pub fn sign_hash(&self, hash: &[u8; 32]) -> DecoratedSignature {
        let signature = self.signing_key.sign(hash);
        DecoratedSignature {
            hint: self.hint(),
            signature: base64::engine::general_purpose::STANDARD.encode(signature.to_bytes()),
        }
    }

    /// Sign an assembled transaction for the given network
    pub fn sign_transaction(
        &self,
        tx: Transaction,
        network_passphrase: &str,
    ) -> Result<SignedTransaction> {
        let hash = tx.hash(network_passphrase)?;
        let signature = self.sign_hash(&hash);
        Ok(SignedTransaction {
            tx,
            signatures: vec![signature],
        })
    }
}

// Implement Debug manually to avoid exposing the signing key
impl std::fmt::Debug for FundingSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FundingSigner")
            .field("account_id", &self.account_id)
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Account, InvokeContract, ScAddress};
    use ed25519_dalek::Verifier;

    // Test seed (DO NOT use in production!)
    const TEST_SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

    fn signer() -> FundingSigner {
        FundingSigner::from_secret(&SecretString::from(TEST_SEED.to_string()), "GFUNDER").unwrap()
    }

    #[test]
    fn derives_rfc8032_public_key() {
        assert_eq!(
            signer().public_key_hex(),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
    }

    #[test]
    fn signed_transaction_verifies() {
        let account = Account {
            account_id: "GFUNDER".to_string(),
            sequence: 1,
        };
        let op = InvokeContract::new(
            ScAddress::Contract("C".repeat(56)),
            "deploy",
            Vec::new(),
        );
        let tx = Transaction::build(&account, 100, 30, op);
        let signer = signer();
        let signed = signer.sign_transaction(tx.clone(), "Test Network").unwrap();

        let sig_bytes = base64::engine::general_purpose::STANDARD
            .decode(&signed.signatures[0].signature)
            .unwrap();
        let signature = ed25519_dalek::Signature::from_slice(&sig_bytes).unwrap();
        let hash = tx.hash("Test Network").unwrap();
        assert!(signer.verifying_key().verify(&hash, &signature).is_ok());
        assert_eq!(signed.signatures[0].hint.len(), 8);
    }

    #[test]
    fn rejects_short_seed() {
        let err = FundingSigner::from_secret(&SecretString::from("abcd".to_string()), "G")
            .unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn debug_redacts_key() {
        let debug_str = format!("{:?}", signer());
        assert!(!debug_str.contains("9d61b19d"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
