//! Shared transaction submission pipeline
//!
//! Every deployment and wallet operation ends here:
//!
//! ```text
//! Built -> Simulated{ok|error|restore} -> Assembled -> Signed
//!       -> Sent{pending|error} -> Confirmed{success|failed} | TimedOut
//! ```
//!
//! Every terminal state other than a successful confirmation is returned as
//! an error carrying its diagnostic context. Nothing is retried here.

use crate::ledger::{
    format_events, Account, GetTransactionResponse, InvokeContract, LedgerNode, ScVal,
    SendStatus, SimulationResponse, SimulationSuccess, Transaction, TransactionStatus,
};
use crate::poll::{poll_until, Poll, PollOutcome, PollPolicy};
use crate::wallet::FundingAccount;
use crate::{Error, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Which timeout error to raise when the poll budget runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationKind {
    Deployment,
    Transaction,
}

/// Fee and validity settings applied to built transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    pub fee: u64,
    pub timeout_seconds: u64,
    pub poll: PollPolicy,
    pub kind: ConfirmationKind,
}

/// Lifecycle stage of a [`TransactionAttempt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Built,
    Simulated,
    Assembled,
    Signed,
    Sent,
    Confirmed,
    Failed,
    TimedOut,
}

/// State of one submission, alive only for the duration of a submit call
#[derive(Debug)]
pub struct TransactionAttempt {
    pub built: Option<Transaction>,
    pub simulation: Option<SimulationSuccess>,
    pub assembled: Option<Transaction>,
    pub hash: Option<String>,
    pub state: AttemptState,
}

impl TransactionAttempt {
    fn new() -> Self {
        Self {
            built: None,
            simulation: None,
            assembled: None,
            hash: None,
            state: AttemptState::Built,
        }
    }

    fn advance(&mut self, state: AttemptState) {
        debug!(from = ?self.state, to = ?state, hash = ?self.hash, "Transaction state change");
        self.state = state;
    }
}

/// A confirmed transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmed {
    pub hash: String,
    pub ledger: Option<u32>,
    pub return_value: Option<ScVal>,
    /// Number of `getTransaction` polls it took
    pub attempts: u32,
}

/// Builds, signs and confirms transactions paid for by the funding account
#[derive(Clone)]
pub struct TransactionSubmitter {
    node: Arc<dyn LedgerNode>,
    funding: Arc<FundingAccount>,
    network_passphrase: String,
    cancel: CancellationToken,
}

impl TransactionSubmitter {
    pub fn new(
        node: Arc<dyn LedgerNode>,
        funding: Arc<FundingAccount>,
        network_passphrase: impl Into<String>,
    ) -> Self {
        Self {
            node,
            funding,
            network_passphrase: network_passphrase.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` to abort in-flight confirmation polling
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn node(&self) -> &Arc<dyn LedgerNode> {
        &self.node
    }

    pub fn funding(&self) -> &Arc<FundingAccount> {
        &self.funding
    }

    /// Runs one invocation through the full lifecycle.
    pub async fn submit(&self, operation: InvokeContract, options: SubmitOptions) -> Result<Confirmed> {
        let mut attempt = TransactionAttempt::new();
        let hash = self.send(operation, options, &mut attempt).await?;
        self.confirm(&hash, options, &mut attempt).await
    }

    /// Simulate → assemble → sign → send, under the funding account lease.
    ///
    /// The sequence is committed to the lease only once the node accepts the
    /// transaction; any earlier failure leaves it free for the next caller.
    async fn send(
        &self,
        operation: InvokeContract,
        options: SubmitOptions,
        attempt: &mut TransactionAttempt,
    ) -> Result<String> {
        let mut lease = self.funding.lease().await;

        let account = self.node.get_account(self.funding.account_id()).await?;
        let account = Account {
            sequence: lease.base(account.sequence),
            ..account
        };
        let function = operation.function.clone();
        let contract = operation.contract.to_string();
        let built = Transaction::build(&account, options.fee, options.timeout_seconds, operation);
        let sequence = built.sequence;
        debug!(
            contract = %contract,
            function = %function,
            sequence = sequence,
            "Built transaction"
        );
        attempt.built = Some(built.clone());

        let simulation = match self.node.simulate_transaction(&built).await? {
            SimulationResponse::Success(success) => success,
            SimulationResponse::Error { error, events } => {
                attempt.advance(AttemptState::Failed);
                warn!(contract = %contract, function = %function, error = %error, "Simulation failed");
                return Err(Error::Simulation {
                    message: error,
                    events: format_events(&events),
                });
            }
            SimulationResponse::RestoreRequired { .. } => {
                attempt.advance(AttemptState::Failed);
                warn!(contract = %contract, function = %function, "Simulation requires restore");
                return Err(Error::RestoreRequired);
            }
        };
        attempt.advance(AttemptState::Simulated);

        let assembled = built.assemble(&simulation);
        attempt.simulation = Some(simulation);
        attempt.assembled = Some(assembled.clone());
        attempt.advance(AttemptState::Assembled);

        let signed = self
            .funding
            .signer()
            .sign_transaction(assembled, &self.network_passphrase)?;
        attempt.advance(AttemptState::Signed);

        let response = self.node.send_transaction(&signed).await?;
        attempt.hash = Some(response.hash.clone());
        match response.status {
            SendStatus::Pending | SendStatus::Duplicate => {
                lease.commit(sequence);
                attempt.advance(AttemptState::Sent);
                info!(hash = %response.hash, function = %function, "Transaction submitted");
                Ok(response.hash)
            }
            SendStatus::Error | SendStatus::TryAgainLater => {
                attempt.advance(AttemptState::Failed);
                let detail = response
                    .error_result
                    .clone()
                    .unwrap_or_else(|| format!("{:?}", response.status));
                warn!(hash = %response.hash, detail = %detail, "Transaction send rejected");
                Err(Error::Send(format!("{} (hash {})", detail, response.hash)))
            }
        }
    }

    async fn confirm(
        &self,
        hash: &str,
        options: SubmitOptions,
        attempt: &mut TransactionAttempt,
    ) -> Result<Confirmed> {
        let node = self.node.clone();
        let outcome = poll_until(options.poll, &self.cancel, |n| {
            let node = node.clone();
            let hash = hash.to_string();
            async move {
                let response = node.get_transaction(&hash).await?;
                debug!(hash = %hash, attempt = n, status = ?response.status, "Polled transaction");
                match response.status {
                    TransactionStatus::Success | TransactionStatus::Failed => {
                        Ok::<_, Error>(Poll::Ready(response))
                    }
                    TransactionStatus::NotFound | TransactionStatus::Pending => Ok(Poll::Pending),
                }
            }
        })
        .await?;

        match outcome {
            PollOutcome::Ready { value, attempts } => {
                self.finish(hash, value, attempts, attempt)
            }
            PollOutcome::Exhausted { attempts } => {
                attempt.advance(AttemptState::TimedOut);
                warn!(hash = %hash, attempts = attempts, "Transaction confirmation timed out");
                Err(match options.kind {
                    ConfirmationKind::Deployment => Error::DeploymentTimeout {
                        hash: hash.to_string(),
                        attempts,
                    },
                    ConfirmationKind::Transaction => Error::ConfirmationTimeout {
                        hash: hash.to_string(),
                        attempts,
                    },
                })
            }
            PollOutcome::Cancelled { attempts } => {
                attempt.advance(AttemptState::TimedOut);
                warn!(hash = %hash, attempts = attempts, "Transaction confirmation cancelled");
                Err(Error::Cancelled(hash.to_string()))
            }
        }
    }

    fn finish(
        &self,
        hash: &str,
        response: GetTransactionResponse,
        attempts: u32,
        attempt: &mut TransactionAttempt,
    ) -> Result<Confirmed> {
        if response.status == TransactionStatus::Failed {
            attempt.advance(AttemptState::Failed);
            warn!(hash = %hash, ledger = ?response.ledger, "Transaction failed on ledger");
            return Err(Error::TransactionFailed {
                hash: hash.to_string(),
                ledger: response.ledger,
                events: format_events(&response.diagnostic_events),
            });
        }

        attempt.advance(AttemptState::Confirmed);
        info!(hash = %hash, ledger = ?response.ledger, attempts = attempts, "Transaction confirmed");
        Ok(Confirmed {
            hash: hash.to_string(),
            ledger: response.ledger,
            return_value: response.return_value,
            attempts,
        })
    }
}
