//! Device directory
//!
//! Maps a smart wallet address to the passkey device registered for it. The
//! authoritative directory is owned by the application layer; the engine only
//! reads from it.

use crate::keys::{self, UNCOMPRESSED_POINT_LEN};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A registered passkey device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Wallet contract address the device is registered to
    pub address: String,
    /// SHA-256 of the uncompressed public key
    #[serde(with = "hex_array")]
    pub device_id: [u8; 32],
    /// Uncompressed SEC1 point
    #[serde(
        serialize_with = "serialize_point",
        deserialize_with = "deserialize_point"
    )]
    pub public_key: [u8; UNCOMPRESSED_POINT_LEN],
    pub credential_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

impl DeviceRecord {
    /// Build a record from a registration credential
    pub fn from_credential(
        address: impl Into<String>,
        credential_id: impl Into<String>,
        public_key_cose: &[u8],
    ) -> Result<Self> {
        let public_key = keys::cose_public_key_to_uncompressed(public_key_cose)?;
        Ok(Self {
            address: address.into(),
            device_id: keys::device_id_for_point(&public_key),
            public_key,
            credential_id: credential_id.into(),
            device_name: None,
        })
    }
}

/// Read access to registered devices
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn lookup(&self, address: &str) -> Result<Option<DeviceRecord>>;
}

/// Directory held in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeviceDirectory {
    records: Arc<RwLock<HashMap<String, DeviceRecord>>>,
}

impl InMemoryDeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the device for its address
    pub async fn register(&self, record: DeviceRecord) {
        self.records
            .write()
            .await
            .insert(record.address.clone(), record);
    }

    pub async fn remove(&self, address: &str) -> Option<DeviceRecord> {
        self.records.write().await.remove(address)
    }

    /// Load records from a JSON array file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Directory(format!("failed to read {}: {}", path.display(), e))
        })?;
        let records: Vec<DeviceRecord> = serde_json::from_str(&contents)?;

        let directory = Self::new();
        for record in records {
            directory.register(record).await;
        }
        tracing::info!(path = %path.display(), "Loaded device directory");
        Ok(directory)
    }
}

#[async_trait]
impl DeviceDirectory for InMemoryDeviceDirectory {
    async fn lookup(&self, address: &str) -> Result<Option<DeviceRecord>> {
        Ok(self.records.read().await.get(address).cloned())
    }
}

mod hex_array {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let raw = String::deserialize(deserializer)?;
        crate::keys::parse_hex32(&raw).map_err(D::Error::custom)
    }
}

fn serialize_point<S: Serializer>(
    point: &[u8; UNCOMPRESSED_POINT_LEN],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(point))
}

/// Accepts the stored key as hex or base64, either the raw point or its DER
/// SubjectPublicKeyInfo.
fn deserialize_point<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<[u8; UNCOMPRESSED_POINT_LEN], D::Error> {
    use serde::de::Error as _;

    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.strip_prefix("0x").unwrap_or(&raw);
    let bytes = hex::decode(trimmed)
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(trimmed))
        .map_err(|_| D::Error::custom("public key must be hex or base64"))?;

    let point = if bytes.len() == UNCOMPRESSED_POINT_LEN {
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| D::Error::custom("invalid public key length"))?
    } else {
        keys::der_to_uncompressed(&bytes).map_err(D::Error::custom)?
    };
    if point[0] != 0x04 {
        return Err(D::Error::custom("public key must be an uncompressed point"));
    }
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_record(address: &str) -> DeviceRecord {
        let cose = keys::encode_p256_cose_key(&[0x11; 32], &[0x22; 32]);
        DeviceRecord::from_credential(address, "cred-1", &cose).unwrap()
    }

    #[tokio::test]
    async fn lookup_returns_registered_device() {
        let directory = InMemoryDeviceDirectory::new();
        directory.register(sample_record("CADDR")).await;

        let found = directory.lookup("CADDR").await.unwrap().unwrap();
        assert_eq!(found.credential_id, "cred-1");
        assert!(directory.lookup("COTHER").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn loads_records_from_json_file() {
        let record = sample_record("CADDR");
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&vec![record.clone()]).unwrap()).unwrap();

        let directory = InMemoryDeviceDirectory::load_from_file(file.path())
            .await
            .unwrap();
        assert_eq!(directory.lookup("CADDR").await.unwrap(), Some(record));
    }

    #[test]
    fn accepts_der_encoded_public_key() {
        let record = sample_record("CADDR");
        let der = keys::uncompressed_to_der(&record.public_key).unwrap();
        let json = serde_json::json!({
            "address": "CADDR",
            "deviceId": hex::encode(record.device_id),
            "publicKey": base64::engine::general_purpose::STANDARD.encode(der),
            "credentialId": "cred-1",
        });
        let parsed: DeviceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.public_key, record.public_key);
    }
}
