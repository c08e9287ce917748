//! Signed call envelopes.
//!
//! Outside callers never name their own address. They sign a
//! [`RegistryCall`] together with their next nonce using an ed25519 key; the
//! caller identity is the address derived from that key. The nonce is checked
//! and advanced inside the registry writer, so each envelope is accepted at
//! most once.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use verivault_types::{sha256, Address, Bytes32};

use crate::errors::{ErrorKind, RegistryError};
use crate::registry::CertificateRegistry;
use crate::types::{CallOutcome, EventRecord, RegistryCall};

/// Domain tag prefixed to every signing message.
const CALL_DOMAIN: &[u8] = b"VERIVAULT_CALL";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("signature does not match call")]
    BadSignature,

    #[error("invalid signing seed: {0}")]
    InvalidSeed(String),

    #[error("failed to encode call: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidPublicKey
            | LedgerError::MalformedSignature(_)
            | LedgerError::BadSignature => ErrorKind::Authentication,
            LedgerError::InvalidSeed(_) => ErrorKind::Validation,
            LedgerError::Encoding(_) => ErrorKind::Internal,
            LedgerError::Registry(err) => err.kind(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidPublicKey => "invalid_public_key",
            LedgerError::MalformedSignature(_) => "malformed_signature",
            LedgerError::BadSignature => "bad_signature",
            LedgerError::InvalidSeed(_) => "invalid_seed",
            LedgerError::Encoding(_) => "encoding_error",
            LedgerError::Registry(err) => err.code(),
        }
    }
}

/// Digest signed for `call` at `nonce`:
/// `sha256("VERIVAULT_CALL" || nonce_le || json(call))`.
pub fn signing_digest(call: &RegistryCall, nonce: u64) -> Result<Bytes32, LedgerError> {
    let body = serde_json::to_vec(call)?;
    let mut message = Vec::with_capacity(CALL_DOMAIN.len() + 8 + body.len());
    message.extend_from_slice(CALL_DOMAIN);
    message.extend_from_slice(&nonce.to_le_bytes());
    message.extend_from_slice(&body);
    Ok(sha256(message))
}

/// A registry call signed by its sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCall {
    pub call: RegistryCall,
    pub nonce: u64,
    /// ed25519 verifying key, hex encoded.
    pub public_key: Bytes32,
    /// 64-byte ed25519 signature over [`signing_digest`], hex encoded.
    pub signature: String,
}

impl SignedCall {
    /// Check the signature and return the sender's address.
    pub fn verify(&self) -> Result<Address, LedgerError> {
        let verifying_key = VerifyingKey::from_bytes(self.public_key.as_bytes())
            .map_err(|_| LedgerError::InvalidPublicKey)?;

        let raw = self.signature.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(raw).map_err(|e| LedgerError::MalformedSignature(e.to_string()))?;
        let signature = Signature::from_slice(&bytes)
            .map_err(|e| LedgerError::MalformedSignature(e.to_string()))?;

        let digest = signing_digest(&self.call, self.nonce)?;
        verifying_key
            .verify(digest.as_bytes(), &signature)
            .map_err(|_| LedgerError::BadSignature)?;

        Ok(Address::from_public_key(self.public_key.as_bytes()))
    }

    /// Identifier of this envelope: sha256 over the signing digest and the
    /// signature text.
    pub fn tx_hash(&self) -> Result<Bytes32, LedgerError> {
        let digest = signing_digest(&self.call, self.nonce)?;
        let mut data = digest.as_bytes().to_vec();
        data.extend_from_slice(self.signature.as_bytes());
        Ok(sha256(data))
    }
}

/// ed25519 key held in process.
pub struct LocalSigner {
    key: SigningKey,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// 32-byte seed as hex, with or without `0x`.
    pub fn from_seed_hex(seed: &str) -> Result<Self, LedgerError> {
        let seed = seed.trim();
        let seed = seed.strip_prefix("0x").unwrap_or(seed);
        let bytes = hex::decode(seed).map_err(|e| LedgerError::InvalidSeed(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| LedgerError::InvalidSeed(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Self::from_seed(seed))
    }

    /// Hex seed accepted by [`LocalSigner::from_seed_hex`].
    pub fn seed_hex(&self) -> String {
        format!("0x{}", hex::encode(self.key.to_bytes()))
    }

    pub fn public_key(&self) -> Bytes32 {
        Bytes32(self.key.verifying_key().to_bytes())
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(&self.key.verifying_key().to_bytes())
    }

    pub fn sign(&self, call: RegistryCall, nonce: u64) -> Result<SignedCall, LedgerError> {
        let digest = signing_digest(&call, nonce)?;
        let signature = self.key.sign(digest.as_bytes());
        Ok(SignedCall {
            call,
            nonce,
            public_key: self.public_key(),
            signature: hex::encode(signature.to_bytes()),
        })
    }
}

/// Result of an executed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: Bytes32,
    pub caller: Address,
    pub nonce: u64,
    pub version: u64,
    pub outcome: CallOutcome,
    pub events: Vec<EventRecord>,
}

/// Authenticates envelopes and submits them to the registry.
#[derive(Debug, Clone)]
pub struct CertificateLedger {
    registry: Arc<CertificateRegistry>,
}

impl CertificateLedger {
    pub fn new(registry: Arc<CertificateRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CertificateRegistry> {
        &self.registry
    }

    pub fn execute(&self, signed: &SignedCall) -> Result<Receipt, LedgerError> {
        let caller = signed.verify()?;
        let tx_hash = signed.tx_hash()?;
        debug!(%caller, nonce = signed.nonce, tx = %tx_hash, "Executing signed call");

        let committed = self
            .registry
            .submit_with_nonce(&caller, signed.nonce, &signed.call)?;

        Ok(Receipt {
            tx_hash,
            caller,
            nonce: signed.nonce,
            version: committed.version,
            outcome: committed.outcome,
            events: committed.events,
        })
    }
}
