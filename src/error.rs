//! Error types for the passkey wallet engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Key format error: {0}")]
    KeyFormat(String),

    #[error(
        "{name} contract {contract_id} is not deployed on this network. \
         Deploy it (or fix the configured contract id) before provisioning wallets."
    )]
    ContractNotDeployed { name: String, contract_id: String },

    #[error(
        "Factory deployment rejected by the auth controller ({detail}). Check that:\n\
         1. the auth controller contract is deployed and initialized\n\
         2. the factory contract is registered in the auth controller\n\
         3. the admin signer is registered in the auth controller{}{}",
        format_tx_context(.hash, .ledger),
        format_event_suffix(.events)
    )]
    ControllerMisconfigured {
        detail: String,
        /// Set when the rejection came from an executed transaction
        hash: Option<String>,
        ledger: Option<u32>,
        events: Vec<String>,
    },

    #[error("Transaction simulation failed: {message}{}", format_event_suffix(.events))]
    Simulation { message: String, events: Vec<String> },

    #[error("Ledger state restore required before this transaction can run")]
    RestoreRequired,

    #[error("Transaction send failed: {0}")]
    Send(String),

    #[error(
        "Transaction {hash} failed in ledger {}{}",
        .ledger.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()),
        format_event_suffix(.events)
    )]
    TransactionFailed {
        hash: String,
        ledger: Option<u32>,
        events: Vec<String>,
    },

    #[error("Deployment {hash} not confirmed after {attempts} attempts")]
    DeploymentTimeout { hash: String, attempts: u32 },

    #[error("Transaction {hash} not confirmed after {attempts} attempts")]
    ConfirmationTimeout { hash: String, attempts: u32 },

    #[error("Confirmation polling for {0} was cancelled")]
    Cancelled(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unexpected contract return value: {0}")]
    UnexpectedReturn(String),

    #[error("Rate limiter error: {0}")]
    RateLimiter(String),

    #[error("Device directory error: {0}")]
    Directory(String),

    #[error("Ledger RPC error: {0}")]
    Rpc(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_event_suffix(events: &[String]) -> String {
    if events.is_empty() {
        return String::new();
    }
    format!("\nDiagnostic events:\n  {}", events.join("\n  "))
}

fn format_tx_context(hash: &Option<String>, ledger: &Option<u32>) -> String {
    match (hash, ledger) {
        (Some(hash), Some(ledger)) => format!("\nTransaction {} (ledger {})", hash, ledger),
        (Some(hash), None) => format!("\nTransaction {}", hash),
        (None, Some(ledger)) => format!("\nLedger {}", ledger),
        (None, None) => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
