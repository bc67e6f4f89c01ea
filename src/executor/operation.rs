//! Wallet operation envelopes

use crate::keys::{self, UNCOMPRESSED_POINT_LEN};
use crate::ledger::{InvokeContract, ScAddress, ScVal};
use crate::{Error, Result};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;

/// An operation awaiting passkey authorization
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PendingOperation {
    AddDevice {
        /// Hex
        device_id: String,
        /// Uncompressed point (hex or base64) or base64 COSE key
        public_key: String,
        #[serde(default)]
        is_admin: Option<bool>,
        #[serde(default)]
        challenge: Option<String>,
    },
    RemoveDevice {
        device_id: String,
        #[serde(default)]
        challenge: Option<String>,
    },
    InvokeContract {
        /// Defaults to the wallet itself
        #[serde(default)]
        contract_address: Option<String>,
        function_name: String,
        /// Converted with [`ScVal::from_json`]: address-shaped strings become
        /// addresses unless written as `{"type": "string", "value": ...}`
        #[serde(default)]
        args: Option<Vec<Value>>,
        #[serde(default)]
        challenge: Option<String>,
    },
}

impl PendingOperation {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidOperation(e.to_string()))
    }

    pub fn challenge(&self) -> Option<&str> {
        match self {
            Self::AddDevice { challenge, .. }
            | Self::RemoveDevice { challenge, .. }
            | Self::InvokeContract { challenge, .. } => challenge.as_deref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddDevice { .. } => "add_device",
            Self::RemoveDevice { .. } => "remove_device",
            Self::InvokeContract { .. } => "invoke_contract",
        }
    }

    /// Builds the contract invocation this operation stands for
    pub fn to_invocation(&self, wallet: &str) -> Result<InvokeContract> {
        let wallet = ScAddress::parse(wallet)?;
        match self {
            Self::AddDevice {
                device_id,
                public_key,
                is_admin,
                ..
            } => Ok(InvokeContract::new(
                wallet,
                "add_device",
                vec![
                    ScVal::bytes(keys::parse_hex32(device_id)?),
                    ScVal::bytes(decode_public_key(public_key)?),
                    ScVal::Bool(is_admin.unwrap_or(false)),
                ],
            )),
            Self::RemoveDevice { device_id, .. } => Ok(InvokeContract::new(
                wallet,
                "remove_device",
                vec![ScVal::bytes(keys::parse_hex32(device_id)?)],
            )),
            Self::InvokeContract {
                contract_address,
                function_name,
                args,
                ..
            } => {
                if function_name.is_empty() {
                    return Err(Error::InvalidOperation("functionName is empty".to_string()));
                }
                let contract = match contract_address {
                    Some(address) => ScAddress::parse(address)?,
                    None => wallet,
                };
                let args = args
                    .iter()
                    .flatten()
                    .map(ScVal::from_json)
                    .collect::<Result<Vec<_>>>()?;
                Ok(InvokeContract::new(contract, function_name.clone(), args))
            }
        }
    }
}

fn decode_public_key(encoded: &str) -> Result<[u8; UNCOMPRESSED_POINT_LEN]> {
    let trimmed = encoded.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(trimmed)
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(trimmed))
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(trimmed))
        .map_err(|_| Error::InvalidOperation("publicKey must be hex or base64".to_string()))?;

    if bytes.len() == UNCOMPRESSED_POINT_LEN && bytes[0] == 0x04 {
        let mut point = [0u8; UNCOMPRESSED_POINT_LEN];
        point.copy_from_slice(&bytes);
        return Ok(point);
    }
    keys::cose_public_key_to_uncompressed(&bytes)
}
