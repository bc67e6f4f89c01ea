//! Ledger node access
//!
//! The engine talks to the ledger through the [`LedgerNode`] trait. The
//! production implementation is the JSON-RPC client in [`rpc`]; tests plug in
//! scripted nodes.

pub mod rpc;
mod transaction;
mod value;

pub use rpc::RpcLedgerNode;
pub use transaction::{
    Account, DecoratedSignature, GetTransactionResponse, InvokeContract, LedgerEntry, LedgerKey,
    SendResponse, SendStatus, SignedTransaction, SimulationResponse, SimulationSuccess,
    Transaction, TransactionStatus,
};
pub use value::{format_events, DiagnosticEvent, ScAddress, ScVal};

use crate::Result;
use async_trait::async_trait;

/// RPC surface of a ledger node
#[async_trait]
pub trait LedgerNode: Send + Sync {
    /// Loads an account (for its sequence number)
    async fn get_account(&self, account_id: &str) -> Result<Account>;

    /// Dry-runs a transaction for fees, footprint and authorization
    async fn simulate_transaction(&self, tx: &Transaction) -> Result<SimulationResponse>;

    /// Broadcasts a signed transaction
    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<SendResponse>;

    /// Looks up a submitted transaction by hash
    async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse>;

    /// Reads raw ledger entries
    async fn get_ledger_entries(&self, keys: &[LedgerKey]) -> Result<Vec<LedgerEntry>>;
}

/// Checks whether a contract instance exists on the ledger.
pub async fn verify_contract_exists(node: &dyn LedgerNode, contract_id: &str) -> Result<bool> {
    let key = LedgerKey::ContractInstance {
        contract: contract_id.to_string(),
    };
    let entries = node.get_ledger_entries(std::slice::from_ref(&key)).await?;
    Ok(entries.iter().any(|entry| entry.key == key))
}
