//! Ledger value encoding
//!
//! Contract arguments, return values and diagnostic event payloads all travel
//! as [`ScVal`]. Matching on the enum is exhaustive, so every case is handled
//! explicitly when decoding results and rendering diagnostics.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const STRKEY_LEN: usize = 56;

/// A ledger address: either a classic account or a contract
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ScAddress {
    /// `G...` account id
    Account(String),
    /// `C...` contract id
    Contract(String),
}

impl ScAddress {
    /// Parses a strkey-shaped address, choosing the variant from its prefix.
    pub fn parse(value: &str) -> Result<Self> {
        if !looks_like_strkey(value) {
            return Err(Error::InvalidArgument(format!(
                "not a ledger address: {}",
                value
            )));
        }
        match value.as_bytes()[0] {
            b'G' => Ok(Self::Account(value.to_string())),
            b'C' => Ok(Self::Contract(value.to_string())),
            _ => Err(Error::InvalidArgument(format!(
                "unsupported address type: {}",
                value
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Account(id) | Self::Contract(id) => id,
        }
    }
}

impl fmt::Display for ScAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn looks_like_strkey(value: &str) -> bool {
    value.len() == STRKEY_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
}

/// Typed ledger value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScVal {
    Void,
    Bool(bool),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    /// Carried as a decimal string on the wire
    U128(#[serde(with = "decimal")] u128),
    I128(#[serde(with = "decimal")] i128),
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
    String(String),
    Symbol(String),
    Vec(Vec<ScVal>),
    Map(Vec<(ScVal, ScVal)>),
    Address(ScAddress),
}

impl ScVal {
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    /// Returns the address if this value is one
    pub fn as_address(&self) -> Option<&ScAddress> {
        match self {
            Self::Address(addr) => Some(addr),
            _ => None,
        }
    }

    /// Converts a loosely typed JSON argument into a ledger value.
    ///
    /// - `null` → `Void`, booleans → `Bool`
    /// - integers → `I64` (or `U64` above `i64::MAX`)
    /// - strings shaped like addresses (56 base32 characters starting with
    ///   `G` or `C`) → `Address`, other strings → `String`. A string argument
    ///   of that shape must be sent typed: `{"type": "string", "value": ...}`
    /// - arrays → `Vec`
    /// - `{"type": ..., "value": ...}` → that exact typed value
    /// - `{"bytes": "<hex>"}` → `Bytes`, `{"symbol": "..."}` → `Symbol`
    /// - other objects → `Map` keyed by `Symbol`
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::Void),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::I64(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self::U64(u))
                } else {
                    Err(Error::InvalidOperation(format!(
                        "fractional numbers are not valid contract arguments: {}",
                        n
                    )))
                }
            }
            Value::String(s) => match ScAddress::parse(s) {
                Ok(addr) => Ok(Self::Address(addr)),
                Err(_) => Ok(Self::String(s.clone())),
            },
            Value::Array(items) => items
                .iter()
                .map(Self::from_json)
                .collect::<Result<Vec<_>>>()
                .map(Self::Vec),
            Value::Object(map) => {
                if map.contains_key("type") {
                    return serde_json::from_value(value.clone()).map_err(|e| {
                        Error::InvalidOperation(format!("invalid typed argument: {}", e))
                    });
                }
                if let (1, Some(Value::String(raw))) = (map.len(), map.get("bytes")) {
                    let trimmed = raw.strip_prefix("0x").unwrap_or(raw);
                    let bytes = hex::decode(trimmed).map_err(|e| {
                        Error::InvalidOperation(format!("invalid bytes argument: {}", e))
                    })?;
                    return Ok(Self::Bytes(bytes));
                }
                if let (1, Some(Value::String(name))) = (map.len(), map.get("symbol")) {
                    return Ok(Self::Symbol(name.clone()));
                }
                let mut entries = Vec::with_capacity(map.len());
                for (key, item) in map {
                    entries.push((Self::Symbol(key.clone()), Self::from_json(item)?));
                }
                Ok(Self::Map(entries))
            }
        }
    }
}

impl fmt::Display for ScVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("Void"),
            Self::Bool(b) => write!(f, "Bool({})", b),
            Self::U32(n) => write!(f, "U32({})", n),
            Self::I32(n) => write!(f, "I32({})", n),
            Self::U64(n) => write!(f, "U64({})", n),
            Self::I64(n) => write!(f, "I64({})", n),
            Self::U128(n) => write!(f, "U128({})", n),
            Self::I128(n) => write!(f, "I128({})", n),
            Self::Bytes(b) => write!(f, "Bytes(0x{})", hex::encode(b)),
            Self::String(s) => write!(f, "String({:?})", s),
            Self::Symbol(s) => write!(f, "Symbol({})", s),
            Self::Vec(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            Self::Address(addr) => write!(f, "Address({})", addr),
        }
    }
}

/// Structured trace data emitted by a simulated or executed contract call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEvent {
    #[serde(default)]
    pub in_successful_contract_call: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub topics: Vec<ScVal>,
    #[serde(default = "void")]
    pub data: ScVal,
}

fn void() -> ScVal {
    ScVal::Void
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(contract) = &self.contract_id {
            write!(f, "contract={} ", contract)?;
        }
        f.write_str("topics=[")?;
        for (i, topic) in self.topics.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", topic)?;
        }
        write!(f, "] data={}", self.data)
    }
}

/// Renders events as one `topics/data` line each for error reports.
pub fn format_events(events: &[DiagnosticEvent]) -> Vec<String> {
    events.iter().map(ToString::to_string).collect()
}

mod decimal {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T: Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, T, D>(d: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(D::Error::custom)
    }
}

mod hex_bytes {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(d)?;
        hex::decode(raw.strip_prefix("0x").unwrap_or(&raw)).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONTRACT: &str = "CAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAD2";

    #[test]
    fn parses_address_variants() {
        assert!(matches!(
            ScAddress::parse(CONTRACT).unwrap(),
            ScAddress::Contract(_)
        ));
        let account = CONTRACT.replacen('C', "G", 1);
        assert!(matches!(
            ScAddress::parse(&account).unwrap(),
            ScAddress::Account(_)
        ));
        assert!(ScAddress::parse("CSHORT").is_err());
        assert!(ScAddress::parse(&CONTRACT.replacen('C', "M", 1)).is_err());
    }

    #[test]
    fn converts_loose_json_arguments() {
        let value = ScVal::from_json(&json!([
            1,
            true,
            "hello",
            CONTRACT,
            {"bytes": "0xdead"},
            {"symbol": "transfer"},
            {"type": "u32", "value": 7}
        ]))
        .unwrap();

        assert_eq!(
            value,
            ScVal::Vec(vec![
                ScVal::I64(1),
                ScVal::Bool(true),
                ScVal::String("hello".to_string()),
                ScVal::Address(ScAddress::Contract(CONTRACT.to_string())),
                ScVal::Bytes(vec![0xde, 0xad]),
                ScVal::Symbol("transfer".to_string()),
                ScVal::U32(7),
            ])
        );
    }

    #[test]
    fn rejects_fractional_numbers() {
        let err = ScVal::from_json(&json!(1.5)).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[test]
    fn large_integers_use_decimal_strings() {
        let value = ScVal::I128(i128::MIN);
        let encoded = serde_json::to_value(&value).unwrap();
        assert_eq!(
            encoded,
            json!({"type": "i128", "value": "-170141183460469231731687303715884105728"})
        );
        assert_eq!(serde_json::from_value::<ScVal>(encoded).unwrap(), value);
    }

    #[test]
    fn event_rendering() {
        let event = DiagnosticEvent {
            in_successful_contract_call: false,
            contract_id: Some(CONTRACT.to_string()),
            topics: vec![ScVal::symbol("error"), ScVal::U32(3)],
            data: ScVal::String("missing value".to_string()),
        };
        let line = event.to_string();
        assert!(line.starts_with("contract=C"));
        assert!(line.contains("topics=[Symbol(error), U32(3)]"));
        assert!(line.contains("data=String(\"missing value\")"));
    }
}
