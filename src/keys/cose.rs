//! Minimal COSE_Key decoding
//!
//! WebAuthn authenticators hand back the credential public key as a CBOR map
//! (RFC 9053 COSE_Key). Only EC2 keys on P-256 are accepted. The reader below
//! understands enough CBOR to walk that map and skip any extra entries.

use crate::{Error, Result};

/// COSE map labels
const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const LABEL_Y: i64 = -3;

const KTY_EC2: i64 = 2;
const CRV_P256: i64 = 1;
const ALG_ES256: i64 = -7;

/// Nested maps/arrays deeper than this are rejected
const MAX_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
enum CborValue {
    Int(i64),
    Bytes(Vec<u8>),
    Text(String),
    Other,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| Error::KeyFormat("truncated COSE key".to_string()))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads an initial byte and its argument, returning (major type, argument).
    fn header(&mut self) -> Result<(u8, u64)> {
        let initial = self.byte()?;
        let major = initial >> 5;
        let info = initial & 0x1f;
        let arg = match info {
            0..=23 => info as u64,
            24 => self.byte()? as u64,
            25 => u16::from_be_bytes([self.byte()?, self.byte()?]) as u64,
            26 => {
                let b = self.take(4)?;
                u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64
            }
            27 => {
                let b = self.take(8)?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(b);
                u64::from_be_bytes(arr)
            }
            _ => {
                return Err(Error::KeyFormat(format!(
                    "unsupported CBOR additional info {}",
                    info
                )))
            }
        };
        Ok((major, arg))
    }

    fn length(arg: u64) -> Result<usize> {
        usize::try_from(arg).map_err(|_| Error::KeyFormat("CBOR length overflow".to_string()))
    }

    fn value(&mut self, depth: usize) -> Result<CborValue> {
        if depth > MAX_DEPTH {
            return Err(Error::KeyFormat("COSE key nested too deeply".to_string()));
        }

        let (major, arg) = self.header()?;
        match major {
            0 => i64::try_from(arg)
                .map(CborValue::Int)
                .map_err(|_| Error::KeyFormat("CBOR integer out of range".to_string())),
            1 => i64::try_from(arg)
                .map(|n| CborValue::Int(-1 - n))
                .map_err(|_| Error::KeyFormat("CBOR integer out of range".to_string())),
            2 => Ok(CborValue::Bytes(self.take(Self::length(arg)?)?.to_vec())),
            3 => {
                let raw = self.take(Self::length(arg)?)?;
                String::from_utf8(raw.to_vec())
                    .map(CborValue::Text)
                    .map_err(|_| Error::KeyFormat("invalid UTF-8 in CBOR text".to_string()))
            }
            4 => {
                for _ in 0..arg {
                    self.value(depth + 1)?;
                }
                Ok(CborValue::Other)
            }
            5 => {
                for _ in 0..arg {
                    self.value(depth + 1)?;
                    self.value(depth + 1)?;
                }
                Ok(CborValue::Other)
            }
            6 => {
                // Tag: skip the tag number, keep the tagged item
                self.value(depth + 1)
            }
            _ => Ok(CborValue::Other),
        }
    }
}

/// Extracts the affine coordinates `(x, y)` from a COSE-encoded P-256 key.
pub(crate) fn decode_p256_coordinates(cose: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let mut reader = Reader::new(cose);
    let (major, entries) = reader.header()?;
    if major != 5 {
        return Err(Error::KeyFormat("COSE key is not a CBOR map".to_string()));
    }

    let mut kty = None;
    let mut alg = None;
    let mut crv = None;
    let mut x = None;
    let mut y = None;

    for _ in 0..entries {
        let key = reader.value(1)?;
        let value = reader.value(1)?;
        let CborValue::Int(label) = key else {
            continue;
        };
        match (label, value) {
            (LABEL_KTY, CborValue::Int(v)) => kty = Some(v),
            (LABEL_ALG, CborValue::Int(v)) => alg = Some(v),
            (LABEL_CRV, CborValue::Int(v)) => crv = Some(v),
            (LABEL_X, CborValue::Bytes(v)) => x = Some(v),
            (LABEL_Y, CborValue::Bytes(v)) => y = Some(v),
            (LABEL_KTY | LABEL_ALG | LABEL_CRV | LABEL_X | LABEL_Y, other) => {
                return Err(Error::KeyFormat(format!(
                    "unexpected value {:?} for COSE label {}",
                    other, label
                )));
            }
            _ => {}
        }
    }

    if reader.pos != cose.len() {
        return Err(Error::KeyFormat(
            "trailing bytes after COSE key".to_string(),
        ));
    }

    match kty {
        Some(KTY_EC2) => {}
        Some(other) => {
            return Err(Error::KeyFormat(format!(
                "unsupported COSE key type {}",
                other
            )))
        }
        None => return Err(Error::KeyFormat("COSE key type missing".to_string())),
    }
    if let Some(crv) = crv.filter(|c| *c != CRV_P256) {
        return Err(Error::KeyFormat(format!("unsupported COSE curve {}", crv)));
    }
    if let Some(alg) = alg.filter(|a| *a != ALG_ES256) {
        return Err(Error::KeyFormat(format!(
            "unsupported COSE algorithm {}",
            alg
        )));
    }

    let x = coordinate(x, "x")?;
    let y = coordinate(y, "y")?;
    Ok((x, y))
}

fn coordinate(value: Option<Vec<u8>>, name: &str) -> Result<[u8; 32]> {
    let bytes =
        value.ok_or_else(|| Error::KeyFormat(format!("COSE key missing {} coordinate", name)))?;
    bytes.as_slice().try_into().map_err(|_| {
        Error::KeyFormat(format!(
            "COSE {} coordinate must be 32 bytes, got {}",
            name,
            bytes.len()
        ))
    })
}

/// Encodes a P-256 EC2 COSE_Key from raw coordinates.
///
/// Used by tests and tooling that need to fabricate credentials.
pub fn encode_p256_cose_key(x: &[u8; 32], y: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(77);
    out.push(0xa5); // map(5)
    out.extend_from_slice(&[0x01, 0x02]); // kty: EC2
    out.extend_from_slice(&[0x03, 0x26]); // alg: ES256 (-7)
    out.extend_from_slice(&[0x20, 0x01]); // crv: P-256
    out.extend_from_slice(&[0x21, 0x58, 0x20]); // x: bytes(32)
    out.extend_from_slice(x);
    out.extend_from_slice(&[0x22, 0x58, 0x20]); // y: bytes(32)
    out.extend_from_slice(y);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_encoded_key() {
        let x = [0x11u8; 32];
        let y = [0x22u8; 32];
        let cose = encode_p256_cose_key(&x, &y);
        let (dx, dy) = decode_p256_coordinates(&cose).unwrap();
        assert_eq!(dx, x);
        assert_eq!(dy, y);
    }

    #[test]
    fn skips_unknown_labels() {
        let x = [0x01u8; 32];
        let y = [0x02u8; 32];
        let mut cose = encode_p256_cose_key(&x, &y);
        // Bump map length to 6 and append a text-keyed entry
        cose[0] = 0xa6;
        cose.extend_from_slice(&[0x63, b'f', b'o', b'o', 0x82, 0x01, 0x02]);
        let (dx, _) = decode_p256_coordinates(&cose).unwrap();
        assert_eq!(dx, x);
    }

    #[test]
    fn rejects_non_map() {
        let err = decode_p256_coordinates(&[0x82, 0x01, 0x02]).unwrap_err();
        assert!(err.to_string().contains("not a CBOR map"));
    }

    #[test]
    fn rejects_truncated_input() {
        let cose = encode_p256_cose_key(&[0u8; 32], &[0u8; 32]);
        let err = decode_p256_coordinates(&cose[..40]).unwrap_err();
        assert!(matches!(err, Error::KeyFormat(_)));
    }

    #[test]
    fn rejects_wrong_curve() {
        let mut cose = encode_p256_cose_key(&[0u8; 32], &[0u8; 32]);
        // crv value lives at offset 6
        cose[6] = 0x02;
        let err = decode_p256_coordinates(&cose).unwrap_err();
        assert!(err.to_string().contains("curve"));
    }

    #[test]
    fn rejects_short_coordinate() {
        let mut cose = vec![0xa3, 0x01, 0x02, 0x21, 0x41, 0x00, 0x22, 0x58, 0x20];
        cose.extend_from_slice(&[0u8; 32]);
        let err = decode_p256_coordinates(&cose).unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }
}
