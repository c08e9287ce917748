//! Types for the certificate registry

use serde::{Deserialize, Serialize};
use verivault_types::{Address, Fingerprint, Role, TokenId};

/// Maximum accepted length of a certificate reference, in bytes.
pub const MAX_REFERENCE_LEN: usize = 2048;

/// One minted certificate. Only `revoked` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub id: TokenId,
    pub owner: Address,
    pub reference: String,
    pub fingerprint: Fingerprint,
    pub revoked: bool,
}

/// Read-only view returned by `verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateView {
    pub owner: Address,
    pub reference: String,
    pub revoked: bool,
    pub fingerprint: Fingerprint,
}

impl From<&CertificateRecord> for CertificateView {
    fn from(record: &CertificateRecord) -> Self {
        Self {
            owner: record.owner,
            reference: record.reference.clone(),
            revoked: record.revoked,
            fingerprint: record.fingerprint,
        }
    }
}

/// A state-changing request against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RegistryCall {
    Mint {
        recipient: Address,
        reference: String,
        fingerprint: Fingerprint,
    },
    Revoke {
        id: TokenId,
    },
    GrantRole {
        role: Role,
        account: Address,
    },
    RevokeRole {
        role: Role,
        account: Address,
    },
    RenounceRole {
        role: Role,
        account: Address,
    },
}

impl RegistryCall {
    pub fn method(&self) -> &'static str {
        match self {
            RegistryCall::Mint { .. } => "mint",
            RegistryCall::Revoke { .. } => "revoke",
            RegistryCall::GrantRole { .. } => "grant_role",
            RegistryCall::RevokeRole { .. } => "revoke_role",
            RegistryCall::RenounceRole { .. } => "renounce_role",
        }
    }
}

/// What an accepted call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallOutcome {
    Minted {
        id: TokenId,
    },
    Revoked {
        id: TokenId,
    },
    /// Role membership after the call. `changed` is false when the call was
    /// a no-op (granting a held role, revoking one that was not held).
    RoleUpdated {
        role: Role,
        account: Address,
        granted: bool,
        changed: bool,
    },
}

/// Events emitted by accepted calls, for external indexers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RegistryEvent {
    Minted {
        id: TokenId,
        recipient: Address,
        issuer: Address,
        reference: String,
        fingerprint: Fingerprint,
    },
    Revoked {
        id: TokenId,
        issuer: Address,
    },
    RoleGranted {
        role: Role,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
        sender: Address,
    },
}

/// An event as committed to the append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Global position in the event log, starting at 0.
    pub seq: u64,
    /// State version the event was committed at.
    pub version: u64,
    #[serde(flatten)]
    pub event: RegistryEvent,
}
