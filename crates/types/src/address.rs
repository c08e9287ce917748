use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::hash::keccak256;

/// Errors that can occur when parsing an account address string.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AddressError {
    #[error("address must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("address payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Number of raw bytes contained in an address.
pub const ADDRESS_BYTES: usize = 20;
/// Expected string length of an encoded address (`0x` + 40 hex chars).
pub const ADDRESS_STRING_LENGTH: usize = 2 + ADDRESS_BYTES * 2;

/// Account identifier used for certificate owners, issuers and role holders.
///
/// Rendered as `0x` followed by 40 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; ADDRESS_BYTES]);

impl Address {
    /// The empty account. Never a valid certificate recipient or role holder.
    pub const ZERO: Address = Address([0u8; ADDRESS_BYTES]);

    pub fn new(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    /// Derive the account for an ed25519 public key: the low 20 bytes of
    /// `keccak256(public_key)`.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let digest = keccak256(public_key);
        let mut bytes = [0u8; ADDRESS_BYTES];
        bytes.copy_from_slice(&digest.as_bytes()[32 - ADDRESS_BYTES..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_BYTES]
    }
}

/// Encode raw address bytes into the canonical `0x`-prefixed form.
pub fn encode_address(bytes: &[u8; ADDRESS_BYTES]) -> String {
    let mut encoded = String::with_capacity(ADDRESS_STRING_LENGTH);
    encoded.push_str("0x");
    encoded.push_str(&hex::encode(bytes));
    encoded
}

/// Decode an address string. The `0x` prefix is optional and hex digits are
/// accepted in either case.
pub fn decode_address(address: &str) -> Result<[u8; ADDRESS_BYTES], AddressError> {
    let trimmed = address.trim();
    let payload = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if payload.len() != ADDRESS_BYTES * 2 {
        return Err(AddressError::InvalidLength {
            expected: ADDRESS_BYTES * 2,
            actual: payload.len(),
        });
    }

    let mut bytes = [0u8; ADDRESS_BYTES];
    hex::decode_to_slice(payload, &mut bytes)?;
    Ok(bytes)
}

/// Check whether the provided string is a valid address.
pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_address(&self.0))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_address(s).map(Address)
    }
}

impl From<[u8; ADDRESS_BYTES]> for Address {
    fn from(value: [u8; ADDRESS_BYTES]) -> Self {
        Address(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        encode_address(&value.0)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode_address(&value).map(Address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let bytes = [0xABu8; ADDRESS_BYTES];
        let encoded = encode_address(&bytes);
        assert!(encoded.starts_with("0x"));
        assert_eq!(encoded.len(), ADDRESS_STRING_LENGTH);

        let decoded = decode_address(&encoded).expect("address should decode");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn prefix_is_optional_and_case_insensitive() {
        let upper = format!("0X{}", "AA".repeat(ADDRESS_BYTES));
        let bare = "aa".repeat(ADDRESS_BYTES);
        assert_eq!(decode_address(&upper).unwrap(), [0xAA; ADDRESS_BYTES]);
        assert_eq!(decode_address(&bare).unwrap(), [0xAA; ADDRESS_BYTES]);
    }

    #[test]
    fn invalid_length_rejected() {
        let bad = format!("0x{}", "00".repeat(ADDRESS_BYTES - 1));
        let err = decode_address(&bad).unwrap_err();
        assert!(matches!(err, AddressError::InvalidLength { .. }));
    }

    #[test]
    fn invalid_hex_rejected() {
        let bad = format!("0x{}", "gg".repeat(ADDRESS_BYTES));
        let err = decode_address(&bad).unwrap_err();
        assert!(matches!(err, AddressError::InvalidHex(_)));
    }

    #[test]
    fn serde_uses_string_form() {
        let address = Address([0x11; ADDRESS_BYTES]);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "11".repeat(ADDRESS_BYTES)));
        let parsed: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn public_key_derivation_is_stable() {
        let a = Address::from_public_key(&[7u8; 32]);
        let b = Address::from_public_key(&[7u8; 32]);
        let c = Address::from_public_key(&[8u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_zero());
    }
}
