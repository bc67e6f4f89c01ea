//! Passkey key material conversion
//!
//! Converts the COSE public key a WebAuthn authenticator returns at
//! registration into the forms the rest of the engine needs:
//! - the 65-byte uncompressed SEC1 point stored on-chain
//! - a stable 32-byte device id derived from that point
//! - a DER SubjectPublicKeyInfo used for signature verification

mod cose;

pub use cose::encode_p256_cose_key;

use crate::{Error, Result};
use sha2::{Digest, Sha256};

/// Length of an uncompressed SEC1 P-256 point (`0x04 || x || y`)
pub const UNCOMPRESSED_POINT_LEN: usize = 65;

/// ASN.1 SubjectPublicKeyInfo header for an id-ecPublicKey / prime256v1 key,
/// followed by the BIT STRING header for a 65-byte point.
const P256_SPKI_PREFIX: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08, 0x2a,
    0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

/// Converts a COSE-encoded P-256 public key to an uncompressed SEC1 point.
pub fn cose_public_key_to_uncompressed(cose: &[u8]) -> Result<[u8; UNCOMPRESSED_POINT_LEN]> {
    let (x, y) = cose::decode_p256_coordinates(cose)?;
    let mut point = [0u8; UNCOMPRESSED_POINT_LEN];
    point[0] = 0x04;
    point[1..33].copy_from_slice(&x);
    point[33..].copy_from_slice(&y);
    Ok(point)
}

/// Derives the device id for a credential public key.
///
/// The id is the SHA-256 of the uncompressed point, not of the credential id:
/// two credentials wrapping the same key map to the same device.
pub fn derive_device_id(cose: &[u8]) -> Result<[u8; 32]> {
    let point = cose_public_key_to_uncompressed(cose)?;
    Ok(device_id_for_point(&point))
}

/// Device id for an already-uncompressed point.
pub fn device_id_for_point(point: &[u8; UNCOMPRESSED_POINT_LEN]) -> [u8; 32] {
    Sha256::digest(point).into()
}

/// Default deployment salt: SHA-256 of the credential id.
pub fn default_salt(credential_id: &str) -> [u8; 32] {
    Sha256::digest(credential_id.as_bytes()).into()
}

/// Wraps an uncompressed P-256 point into DER SubjectPublicKeyInfo bytes.
pub fn uncompressed_to_der(point: &[u8]) -> Result<Vec<u8>> {
    check_uncompressed(point)?;
    let mut der = Vec::with_capacity(P256_SPKI_PREFIX.len() + UNCOMPRESSED_POINT_LEN);
    der.extend_from_slice(&P256_SPKI_PREFIX);
    der.extend_from_slice(point);
    Ok(der)
}

/// Extracts the uncompressed point from a P-256 DER SubjectPublicKeyInfo.
pub fn der_to_uncompressed(der: &[u8]) -> Result<[u8; UNCOMPRESSED_POINT_LEN]> {
    let point = der
        .strip_prefix(&P256_SPKI_PREFIX[..])
        .ok_or_else(|| Error::KeyFormat("not a P-256 SubjectPublicKeyInfo".to_string()))?;
    check_uncompressed(point)?;
    let mut out = [0u8; UNCOMPRESSED_POINT_LEN];
    out.copy_from_slice(point);
    Ok(out)
}

fn check_uncompressed(point: &[u8]) -> Result<()> {
    if point.len() != UNCOMPRESSED_POINT_LEN {
        return Err(Error::KeyFormat(format!(
            "uncompressed point must be {} bytes, got {}",
            UNCOMPRESSED_POINT_LEN,
            point.len()
        )));
    }
    if point[0] != 0x04 {
        return Err(Error::KeyFormat(
            "uncompressed point must start with 0x04".to_string(),
        ));
    }
    Ok(())
}

/// Parses a 32-byte value from hex, with or without a `0x` prefix.
pub fn parse_hex32(input: &str) -> Result<[u8; 32]> {
    let trimmed = input.strip_prefix("0x").unwrap_or(input);
    let bytes = hex::decode(trimmed)
        .map_err(|e| Error::InvalidArgument(format!("Invalid hex string: {}", e)))?;
    bytes.as_slice().try_into().map_err(|_| {
        Error::InvalidArgument(format!("expected 32 bytes of hex, got {}", bytes.len()))
    })
}
