//! JSON-RPC ledger node client
//!
//! Speaks JSON-RPC 2.0 over HTTP. Transactions travel as base64 of their
//! JSON serialization, not XDR, so this client only works against a node or
//! gateway that accepts that envelope. Responses are decoded into the typed
//! models in [`super`].

use super::{
    Account, GetTransactionResponse, LedgerEntry, LedgerKey, LedgerNode, SendResponse,
    SignedTransaction, SimulationResponse, Transaction,
};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default HTTP timeout per RPC call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC error object
#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct LedgerEntriesResult {
    #[serde(default)]
    entries: Vec<LedgerEntry>,
}

/// Ledger node reached over HTTP JSON-RPC
pub struct RpcLedgerNode {
    client: Client,
    url: url::Url,
    next_id: AtomicU64,
}

impl RpcLedgerNode {
    /// Create a client for the given RPC endpoint
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| Error::Config(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(method = method, id = id, "Ledger RPC call");

        let response = self
            .client
            .post(self.url.clone())
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: RpcResponse = response.json().await?;
        if let Some(err) = body.error {
            return Err(Error::Rpc(format!(
                "{} failed ({}): {}",
                method, err.code, err.message
            )));
        }

        let result = body
            .result
            .ok_or_else(|| Error::Rpc(format!("{} returned no result", method)))?;
        serde_json::from_value(result)
            .map_err(|e| Error::Rpc(format!("{} returned malformed result: {}", method, e)))
    }
}

fn encode_unsigned(tx: &Transaction) -> Result<String> {
    Ok(base64::engine::general_purpose::STANDARD.encode(tx.to_bytes()?))
}

#[async_trait]
impl LedgerNode for RpcLedgerNode {
    async fn get_account(&self, account_id: &str) -> Result<Account> {
        self.call("getAccount", json!({ "accountId": account_id }))
            .await
    }

    async fn simulate_transaction(&self, tx: &Transaction) -> Result<SimulationResponse> {
        self.call(
            "simulateTransaction",
            json!({ "transaction": encode_unsigned(tx)? }),
        )
        .await
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<SendResponse> {
        self.call(
            "sendTransaction",
            json!({ "transaction": tx.to_envelope()? }),
        )
        .await
    }

    async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse> {
        self.call("getTransaction", json!({ "hash": hash })).await
    }

    async fn get_ledger_entries(&self, keys: &[LedgerKey]) -> Result<Vec<LedgerEntry>> {
        let result: LedgerEntriesResult = self
            .call("getLedgerEntries", json!({ "keys": keys }))
            .await?;
        Ok(result.entries)
    }
}
