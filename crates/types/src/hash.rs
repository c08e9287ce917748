//! Fixed-size digests and the hash functions that produce them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing a 32-byte hex value.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HashParseError {
    #[error("expected 64 hex characters, got {0}")]
    InvalidLength(usize),
    #[error("value is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// A 32-byte value, rendered as `0x` + 64 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bytes32(pub [u8; 32]);

/// Content hash of a certificate file, fixed at mint time.
pub type Fingerprint = Bytes32;

impl Bytes32 {
    pub const ZERO: Bytes32 = Bytes32([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(value: &str) -> Result<Self, HashParseError> {
        let trimmed = value.trim();
        let payload = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if payload.len() != 64 {
            return Err(HashParseError::InvalidLength(payload.len()));
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(payload, &mut out)?;
        Ok(Self(out))
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Bytes32 {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Bytes32 {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl From<Bytes32> for String {
    fn from(value: Bytes32) -> Self {
        value.to_hex()
    }
}

impl TryFrom<String> for Bytes32 {
    type Error = HashParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// Keccak-256 as used for role identifiers and account derivation.
pub fn keccak256(data: impl AsRef<[u8]>) -> Bytes32 {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_ref());
    Bytes32(hasher.finalize().into())
}

/// SHA-256, used for uploaded file fingerprints and call digests.
pub fn sha256(data: impl AsRef<[u8]>) -> Bytes32 {
    Bytes32(Sha256::digest(data.as_ref()).into())
}
