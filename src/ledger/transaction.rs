//! Transaction model and node response types

use super::value::{DiagnosticEvent, ScAddress, ScVal};
use crate::{Error, Result};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Envelope type tag mixed into the signature payload
const ENVELOPE_TYPE_TX: &[u8] = b"tx";

/// Funding account state as reported by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
    /// Current sequence number; the next transaction uses `sequence + 1`
    #[serde(with = "sequence_string")]
    pub sequence: i64,
}

/// A single contract invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeContract {
    pub contract: ScAddress,
    pub function: String,
    pub args: Vec<ScVal>,
    /// Authorization entries, filled in from simulation
    #[serde(default)]
    pub auth: Vec<String>,
}

impl InvokeContract {
    pub fn new(contract: ScAddress, function: impl Into<String>, args: Vec<ScVal>) -> Self {
        Self {
            contract,
            function: function.into(),
            args,
            auth: Vec::new(),
        }
    }
}

/// Unsigned transaction carrying one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub source: String,
    /// Total fee in the ledger's base unit
    pub fee: u64,
    pub sequence: i64,
    /// Validity window, seconds from build time
    pub timeout_seconds: u64,
    pub operation: InvokeContract,
    /// Resource footprint and fees from simulation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soroban_data: Option<String>,
}

impl Transaction {
    /// Builds a transaction from the funding account's current state.
    pub fn build(
        source: &Account,
        fee: u64,
        timeout_seconds: u64,
        operation: InvokeContract,
    ) -> Self {
        Self {
            source: source.account_id.clone(),
            fee,
            sequence: source.sequence + 1,
            timeout_seconds,
            operation,
            soroban_data: None,
        }
    }

    /// Canonical byte encoding sent to the node
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Hash the funding key signs: `sha256(sha256(passphrase) || "tx" || bytes)`.
    pub fn hash(&self, network_passphrase: &str) -> Result<[u8; 32]> {
        let network_id = Sha256::digest(network_passphrase.as_bytes());
        let mut hasher = Sha256::new();
        hasher.update(network_id);
        hasher.update(ENVELOPE_TYPE_TX);
        hasher.update(self.to_bytes()?);
        Ok(hasher.finalize().into())
    }

    /// Merges simulation output into the transaction.
    ///
    /// Authorization entries are taken from simulation only when the caller
    /// did not provide any, and the minimum resource fee is added on top of
    /// the inclusion fee.
    pub fn assemble(mut self, simulation: &SimulationSuccess) -> Self {
        if self.operation.auth.is_empty() {
            self.operation.auth = simulation.auth.clone();
        }
        self.fee = self.fee.saturating_add(simulation.min_resource_fee);
        self.soroban_data = Some(simulation.transaction_data.clone());
        self
    }
}

/// Signature with the hint identifying the signing key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoratedSignature {
    /// Last four bytes of the signer's public key, hex
    pub hint: String,
    /// Signature bytes, base64
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub signatures: Vec<DecoratedSignature>,
}

impl SignedTransaction {
    /// Base64 envelope as carried over RPC
    pub fn to_envelope(&self) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(self)?))
    }

    pub fn from_envelope(envelope: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(envelope)
            .map_err(|e| Error::Rpc(format!("invalid transaction envelope: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Successful simulation output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSuccess {
    pub transaction_data: String,
    #[serde(default)]
    pub min_resource_fee: u64,
    #[serde(default)]
    pub auth: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ScVal>,
    #[serde(default)]
    pub events: Vec<DiagnosticEvent>,
}

/// Result of `simulateTransaction`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationResponse {
    Success(SimulationSuccess),
    Error {
        error: String,
        #[serde(default)]
        events: Vec<DiagnosticEvent>,
    },
    /// Archived ledger entries must be restored first
    RestoreRequired {
        #[serde(rename = "restorePreamble", default)]
        restore_preamble: Option<String>,
        #[serde(default)]
        events: Vec<DiagnosticEvent>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    Pending,
    Duplicate,
    TryAgainLater,
    Error,
}

/// Result of `sendTransaction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub status: SendStatus,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_result: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    NotFound,
    Pending,
    Success,
    Failed,
}

/// Result of `getTransaction`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionResponse {
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<ScVal>,
    #[serde(default)]
    pub diagnostic_events: Vec<DiagnosticEvent>,
}

impl GetTransactionResponse {
    pub fn not_found() -> Self {
        Self {
            status: TransactionStatus::NotFound,
            ledger: None,
            return_value: None,
            diagnostic_events: Vec::new(),
        }
    }
}

/// Keys accepted by `getLedgerEntries`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerKey {
    Account { account_id: String },
    ContractInstance { contract: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub key: LedgerKey,
    /// Opaque entry payload
    pub data: String,
    #[serde(default)]
    pub last_modified_ledger: u32,
}

mod sequence_string {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Num(n) => Ok(n),
            Raw::Text(s) => s.parse().map_err(D::Error::custom),
        }
    }
}
