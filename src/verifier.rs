//! WebAuthn assertion verification
//!
//! SECURITY: `verify` is fail-closed and uniform. Every failure (rate limit,
//! malformed envelope, challenge mismatch, unknown device, bad signature)
//! yields the same `false`. The cause is logged, never returned.

use crate::directory::DeviceDirectory;
use crate::keys;
use crate::rate_limit::RateLimiter;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

/// Caller-supplied assertion, all fields base64
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureEnvelope {
    authenticator_data: Option<String>,
    #[serde(rename = "clientDataJSON")]
    client_data_json: Option<String>,
    signature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientData {
    challenge: Option<String>,
}

/// Why a verification attempt was refused (internal only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    RateLimited,
    MalformedEnvelope,
    MissingField(&'static str),
    InvalidEncoding(&'static str),
    ChallengeMismatch,
    UnknownDevice,
    InvalidPublicKey,
    BadSignature,
}

/// Verifies passkey assertions against the device registered for an address
#[derive(Clone)]
pub struct SignatureVerifier {
    rate_limiter: Arc<dyn RateLimiter>,
    directory: Arc<dyn DeviceDirectory>,
}

impl SignatureVerifier {
    pub fn new(rate_limiter: Arc<dyn RateLimiter>, directory: Arc<dyn DeviceDirectory>) -> Self {
        Self {
            rate_limiter,
            directory,
        }
    }

    /// Returns `true` only for a valid, fresh assertion from the wallet's device.
    pub async fn verify(&self, address: &str, envelope_json: &str, expected_challenge: &str) -> bool {
        match self
            .verify_detailed(address, envelope_json, expected_challenge)
            .await
        {
            Ok(()) => true,
            Err(failure) => {
                debug!(address = %address, failure = ?failure, "Signature verification refused");
                false
            }
        }
    }

    /// Same checks as [`verify`](Self::verify), reporting the failure cause.
    ///
    /// Not for end users: callers facing untrusted clients must collapse the
    /// result to a boolean.
    pub async fn verify_detailed(
        &self,
        address: &str,
        envelope_json: &str,
        expected_challenge: &str,
    ) -> std::result::Result<(), VerificationFailure> {
        // Rate limit gate runs before any parsing or crypto
        match self.rate_limiter.check(address).await {
            Ok(status) if status.allowed => {}
            Ok(status) => {
                warn!(
                    address = %address,
                    remaining = status.remaining,
                    reset_at = %status.reset_at,
                    "SECURITY: verification rate limit exceeded, possible signature brute force"
                );
                return Err(VerificationFailure::RateLimited);
            }
            Err(e) => {
                warn!(address = %address, error = %e, "Rate limiter unavailable, refusing verification");
                return Err(VerificationFailure::RateLimited);
            }
        }

        let envelope: SignatureEnvelope = serde_json::from_str(envelope_json).map_err(|e| {
            warn!(address = %address, error = %e, "Signature envelope is not valid JSON");
            VerificationFailure::MalformedEnvelope
        })?;

        let authenticator_data = required(envelope.authenticator_data, "authenticatorData")?;
        let client_data_json = required(envelope.client_data_json, "clientDataJSON")?;
        let signature = required(envelope.signature, "signature")?;

        let authenticator_data = decode_base64(&authenticator_data, "authenticatorData")?;
        let client_data_json = decode_base64(&client_data_json, "clientDataJSON")?;
        let signature = decode_base64(&signature, "signature")?;

        let client_data: ClientData = serde_json::from_slice(&client_data_json).map_err(|e| {
            warn!(address = %address, error = %e, "clientDataJSON is not valid JSON");
            VerificationFailure::InvalidEncoding("clientDataJSON")
        })?;
        let challenge = required(client_data.challenge, "challenge")?;
        if challenge.as_bytes() != expected_challenge.as_bytes() {
            warn!(address = %address, "Signature challenge mismatch");
            return Err(VerificationFailure::ChallengeMismatch);
        }

        let device = match self.directory.lookup(address).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                warn!(address = %address, "No device registered for address");
                return Err(VerificationFailure::UnknownDevice);
            }
            Err(e) => {
                warn!(address = %address, error = %e, "Device directory lookup failed");
                return Err(VerificationFailure::UnknownDevice);
            }
        };

        let der = keys::uncompressed_to_der(&device.public_key).map_err(|e| {
            warn!(address = %address, error = %e, "Stored device key is malformed");
            VerificationFailure::InvalidPublicKey
        })?;
        let verifying_key = VerifyingKey::from_public_key_der(&der).map_err(|e| {
            warn!(address = %address, error = %e, "Stored device key is not on P-256");
            VerificationFailure::InvalidPublicKey
        })?;

        let mut signed_data = authenticator_data;
        signed_data.extend_from_slice(&Sha256::digest(&client_data_json));

        let signature = parse_signature(&signature).ok_or_else(|| {
            warn!(address = %address, "Signature is neither DER nor raw r||s");
            VerificationFailure::InvalidEncoding("signature")
        })?;

        if verifying_key.verify(&signed_data, &signature).is_err() {
            warn!(address = %address, "Signature does not match registered device");
            return Err(VerificationFailure::BadSignature);
        }

        if let Err(e) = self.rate_limiter.reset(address).await {
            warn!(address = %address, error = %e, "Failed to reset rate limit after success");
        }
        debug!(address = %address, "Signature verified");
        Ok(())
    }

    /// Releases the rate limiter connection; errors are logged and dropped.
    pub async fn shutdown(&self) {
        if let Err(e) = self.rate_limiter.disconnect().await {
            debug!(error = %e, "Rate limiter disconnect failed");
        }
    }
}

fn required(
    value: Option<String>,
    field: &'static str,
) -> std::result::Result<String, VerificationFailure> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        warn!(field = field, "Signature envelope missing field");
        VerificationFailure::MissingField(field)
    })
}

/// Browsers hand back base64url; other clients pad or use the standard alphabet.
fn decode_base64(
    value: &str,
    field: &'static str,
) -> std::result::Result<Vec<u8>, VerificationFailure> {
    URL_SAFE_NO_PAD
        .decode(value)
        .or_else(|_| URL_SAFE.decode(value))
        .or_else(|_| STANDARD.decode(value))
        .or_else(|_| STANDARD_NO_PAD.decode(value))
        .map_err(|_| {
            warn!(field = field, "Signature envelope field is not base64");
            VerificationFailure::InvalidEncoding(field)
        })
}

/// WebAuthn signatures are DER; raw 64-byte `r || s` is accepted too.
/// High-S values are normalized since authenticators are not required to
/// produce low-S signatures.
fn parse_signature(bytes: &[u8]) -> Option<Signature> {
    let signature = Signature::from_der(bytes)
        .or_else(|_| Signature::from_slice(bytes))
        .ok()?;
    Some(signature.normalize_s().unwrap_or(signature))
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::directory::{DeviceRecord, InMemoryDeviceDirectory};
    use crate::rate_limit::{InMemoryRateLimiter, RateLimitStatus};
    use crate::Result;
    use async_trait::async_trait;
    use base64::Engine as _;
    use p256::ecdsa::signature::Signer;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    const ADDRESS: &str = "CADDR";

    /// Directory that counts lookups
    struct CountingDirectory {
        inner: InMemoryDeviceDirectory,
        lookups: AtomicU32,
    }

    #[async_trait]
    impl DeviceDirectory for CountingDirectory {
        async fn lookup(&self, address: &str) -> Result<Option<DeviceRecord>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(address).await
        }
    }

    async fn fixture(max_attempts: u32) -> (SignatureVerifier, Arc<InMemoryRateLimiter>, Arc<CountingDirectory>) {
        let inner = InMemoryDeviceDirectory::new();
        let record = DeviceRecord::from_credential(ADDRESS, "cred-1", &cose_for(&signing_key(1))).unwrap();
        inner.register(record).await;

        let directory = Arc::new(CountingDirectory {
            inner,
            lookups: AtomicU32::new(0),
        });
        let limiter = Arc::new(InMemoryRateLimiter::new(max_attempts, Duration::from_secs(900)));
        let verifier = SignatureVerifier::new(limiter.clone(), directory.clone());
        (verifier, limiter, directory)
    }

    #[tokio::test]
    async fn accepts_valid_assertion() {
        let (verifier, _, _) = fixture(5).await;
        let env = envelope(&signing_key(1), "abc");
        assert!(verifier.verify(ADDRESS, &env, "abc").await);
    }

    #[tokio::test]
    async fn rejects_challenge_mismatch() {
        let (verifier, _, _) = fixture(5).await;
        let env = envelope(&signing_key(1), "abc");
        assert!(!verifier.verify(ADDRESS, &env, "xyz").await);
        assert_eq!(
            verifier.verify_detailed(ADDRESS, &env, "xyz").await,
            Err(VerificationFailure::ChallengeMismatch)
        );
    }

    #[tokio::test]
    async fn failure_causes_are_indistinguishable() {
        let (verifier, _, _) = fixture(50).await;
        let good = envelope(&signing_key(1), "abc");

        let results = [
            verifier.verify(ADDRESS, "{not json", "abc").await,
            verifier
                .verify(ADDRESS, r#"{"authenticatorData":"AA","signature":"AA"}"#, "abc")
                .await,
            verifier.verify("CUNKNOWN", &good, "abc").await,
            verifier
                .verify(ADDRESS, &envelope(&signing_key(2), "abc"), "abc")
                .await,
        ];
        assert_eq!(results, [false; 4]);

        let (limited, _, _) = fixture(0).await;
        assert_eq!(limited.verify(ADDRESS, &good, "abc").await, results[0]);
    }

    #[tokio::test]
    async fn rate_limit_precedes_lookup() {
        let (verifier, limiter, directory) = fixture(2).await;
        let bad = envelope(&signing_key(2), "abc");
        assert!(!verifier.verify(ADDRESS, &bad, "abc").await);
        assert!(!verifier.verify(ADDRESS, &bad, "abc").await);
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 2);

        // Window exhausted: even a perfect signature is refused without a lookup
        let good = envelope(&signing_key(1), "abc");
        assert_eq!(
            verifier.verify_detailed(ADDRESS, &good, "abc").await,
            Err(VerificationFailure::RateLimited)
        );
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 2);
        assert!(!limiter.check(ADDRESS).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn success_resets_window() {
        let (verifier, limiter, _) = fixture(3).await;
        let bad = envelope(&signing_key(2), "abc");
        assert!(!verifier.verify(ADDRESS, &bad, "abc").await);
        assert!(!verifier.verify(ADDRESS, &bad, "abc").await);

        let good = envelope(&signing_key(1), "abc");
        assert!(verifier.verify(ADDRESS, &good, "abc").await);

        // Fresh window: this check is the first attempt counted
        let status: RateLimitStatus = limiter.check(ADDRESS).await.unwrap();
        assert_eq!(status.remaining, limiter.max_attempts() - 1);
    }

    #[tokio::test]
    async fn failures_accumulate_toward_limit() {
        let (verifier, limiter, _) = fixture(3).await;
        let bad = envelope(&signing_key(2), "abc");
        assert!(!verifier.verify(ADDRESS, &bad, "abc").await);
        let status = limiter.check(ADDRESS).await.unwrap();
        assert_eq!(status.remaining, 1);
    }

    #[tokio::test]
    async fn accepts_raw_signature_and_standard_base64() {
        let (verifier, _, _) = fixture(5).await;
        let key = signing_key(1);
        let authenticator_data = vec![0x05u8; 37];
        let client_data = json!({"type": "webauthn.get", "challenge": "c1"}).to_string();
        let mut signed = authenticator_data.clone();
        signed.extend_from_slice(&Sha256::digest(client_data.as_bytes()));
        let signature: Signature = key.sign(&signed);

        let env = json!({
            "authenticatorData": STANDARD.encode(&authenticator_data),
            "clientDataJSON": STANDARD.encode(client_data.as_bytes()),
            "signature": STANDARD.encode(signature.to_bytes()),
        })
        .to_string();
        assert!(verifier.verify(ADDRESS, &env, "c1").await);
    }

    #[test]
    fn normalizes_high_s() {
        let key = signing_key(1);
        let signature: Signature = key.sign(b"message");
        let (r, s) = signature.split_scalars();
        let high = Signature::from_scalars(r, -*s).unwrap();
        let parsed = parse_signature(high.to_der().as_bytes()).unwrap();
        assert!(key.verifying_key().verify(b"message", &parsed).is_ok());
    }
}
