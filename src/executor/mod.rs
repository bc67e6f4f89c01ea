//! Passkey-authorized wallet operations
//!
//! An operation only reaches the ledger after its signature envelope verifies
//! against the wallet's registered device.

mod operation;

pub use operation::PendingOperation;

use crate::poll::PollPolicy;
use crate::submit::{ConfirmationKind, SubmitOptions, TransactionSubmitter};
use crate::verifier::SignatureVerifier;
use crate::{Error, Result};
use chrono::Utc;
use tracing::{info, warn};

/// Default fee for wallet contract calls (stroops)
pub const CONTRACT_CALL_FEE: u64 = 1_000_000;

/// Default transaction validity window
pub const TX_TIMEOUT_SECONDS: u64 = 30;

/// Verifies and executes wallet operations
pub struct TransactionExecutor {
    submitter: TransactionSubmitter,
    verifier: SignatureVerifier,
    options: SubmitOptions,
}

impl TransactionExecutor {
    pub fn new(submitter: TransactionSubmitter, verifier: SignatureVerifier) -> Self {
        Self {
            submitter,
            verifier,
            options: SubmitOptions {
                fee: CONTRACT_CALL_FEE,
                timeout_seconds: TX_TIMEOUT_SECONDS,
                poll: PollPolicy::CONFIRMATION,
                kind: ConfirmationKind::Transaction,
            },
        }
    }

    pub fn with_fee(mut self, fee: u64, timeout_seconds: u64) -> Self {
        self.options.fee = fee;
        self.options.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.options.poll = poll;
        self
    }

    /// Executes `operation_json` on behalf of the wallet at `address`.
    ///
    /// Returns the confirmed transaction hash.
    ///
    /// `invoke_contract` arguments that look like ledger addresses are sent
    /// as addresses; see [`ScVal::from_json`](crate::ledger::ScVal::from_json)
    /// for sending one as a plain string.
    ///
    /// Without an explicit `challenge` the current time in milliseconds is
    /// expected. Callers are responsible for supplying a fresh server-issued
    /// challenge; the fallback is not replay-safe.
    pub async fn execute(
        &self,
        address: &str,
        operation_json: &str,
        signature_json: &str,
    ) -> Result<String> {
        let operation = PendingOperation::parse(operation_json)?;

        let challenge = match operation.challenge() {
            Some(challenge) => challenge.to_string(),
            None => {
                let fallback = Utc::now().timestamp_millis().to_string();
                warn!(
                    address = %address,
                    operation = operation.kind(),
                    "No challenge supplied, expecting time-based fallback challenge"
                );
                fallback
            }
        };

        if !self
            .verifier
            .verify(address, signature_json, &challenge)
            .await
        {
            warn!(address = %address, operation = operation.kind(), "Operation signature rejected");
            return Err(Error::InvalidSignature);
        }

        let invocation = operation.to_invocation(address)?;
        info!(
            address = %address,
            operation = operation.kind(),
            contract = %invocation.contract,
            function = %invocation.function,
            "Executing wallet operation"
        );

        let confirmed = self.submitter.submit(invocation, self.options).await?;
        info!(address = %address, hash = %confirmed.hash, ledger = ?confirmed.ledger, "Wallet operation confirmed");
        Ok(confirmed.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DeviceRecord, InMemoryDeviceDirectory};
    use crate::ledger::ScVal;
    use crate::rate_limit::InMemoryRateLimiter;
    use crate::submit::testing::*;
    use crate::verifier::testing::{cose_for, envelope, signing_key};
    use serde_json::json;
    use std::sync::Arc;

    const WALLET: &str = "CWALLETAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    async fn executor(node: Arc<ScriptedNode>) -> TransactionExecutor {
        let directory = InMemoryDeviceDirectory::new();
        directory
            .register(DeviceRecord::from_credential(WALLET, "cred-1", &cose_for(&signing_key(1))).unwrap())
            .await;
        let verifier = SignatureVerifier::new(
            Arc::new(InMemoryRateLimiter::default()),
            Arc::new(directory),
        );
        let submitter = TransactionSubmitter::new(node, funding_account(), TEST_PASSPHRASE);
        TransactionExecutor::new(submitter, verifier)
    }

    fn remove_device(challenge: &str) -> String {
        json!({
            "type": "remove_device",
            "deviceId": "0b".repeat(32),
            "challenge": challenge,
        })
        .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn executes_verified_operation() {
        let node = Arc::new(ScriptedNode::new().succeed_on_poll(4, None));
        let hash = executor(node.clone())
            .await
            .execute(WALLET, &remove_device("abc"), &envelope(&signing_key(1), "abc"))
            .await
            .unwrap();

        assert_eq!(node.polls_made(), 4);
        let sent = node.sent.lock().unwrap();
        let tx = &sent[0].tx;
        assert_eq!(hash, hex::encode(tx.hash(TEST_PASSPHRASE).unwrap()));
        assert_eq!(tx.source, FUNDER);
        assert_eq!(tx.timeout_seconds, TX_TIMEOUT_SECONDS);
        assert_eq!(tx.operation.contract.as_str(), WALLET);
        assert_eq!(tx.operation.function, "remove_device");
        assert_eq!(tx.operation.args, vec![ScVal::bytes([0x0b; 32])]);
    }

    #[tokio::test(start_paused = true)]
    async fn challenge_mismatch_submits_nothing() {
        let node = Arc::new(ScriptedNode::new());
        let err = executor(node.clone())
            .await
            .execute(WALLET, &remove_device("xyz"), &envelope(&signing_key(1), "abc"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidSignature));
        assert!(node.simulated.lock().unwrap().is_empty());
        assert!(node.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_device_is_rejected() {
        let node = Arc::new(ScriptedNode::new());
        let err = executor(node.clone())
            .await
            .execute(WALLET, &remove_device("abc"), &envelope(&signing_key(9), "abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
        assert!(node.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_challenge_expects_time_fallback() {
        let node = Arc::new(ScriptedNode::new());
        let op = json!({"type": "invoke_contract", "functionName": "upgrade"}).to_string();
        let err = executor(node)
            .await
            .execute(WALLET, &op, &envelope(&signing_key(1), "abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_operation_is_rejected_before_verification() {
        let node = Arc::new(ScriptedNode::new());
        let err = executor(node)
            .await
            .execute(WALLET, "{\"type\":", &envelope(&signing_key(1), "abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_timeout_uses_transaction_budget() {
        let node = Arc::new(ScriptedNode::new());
        let err = executor(node.clone())
            .await
            .execute(WALLET, &remove_device("abc"), &envelope(&signing_key(1), "abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConfirmationTimeout { attempts: 120, .. }));
        assert_eq!(node.polls_made(), 120);
    }
}
