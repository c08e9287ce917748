//! Error types for the certificate registry

use thiserror::Error;
use verivault_types::{Address, Role, TokenId};

/// Structural problems with call inputs. Checked before any state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("recipient must not be the zero address")]
    ZeroRecipient,

    #[error("reference must not be empty")]
    EmptyReference,

    #[error("reference is {len} bytes, maximum is {max}")]
    ReferenceTooLong { len: usize, max: usize },

    #[error("fingerprint must not be all zero bytes")]
    ZeroFingerprint,

    #[error("role account must not be the zero address")]
    ZeroAccount,

    #[error("registry {field} must not be empty")]
    EmptyMetadata { field: &'static str },
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("account {account} is missing role {role}")]
    Unauthorized { account: Address, role: Role },

    #[error("account {caller} may only renounce its own roles, not {role} for {account}")]
    RenounceForbidden {
        caller: Address,
        account: Address,
        role: Role,
    },

    #[error("certificate {id} not found")]
    NotFound { id: TokenId },

    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("certificate {id} is already revoked")]
    AlreadyRevoked { id: TokenId },

    #[error("all certificate ids are in use")]
    IdsDepleted,

    #[error("nonce mismatch for {account}: expected {expected}, got {actual}")]
    InvalidNonce {
        account: Address,
        expected: u64,
        actual: u64,
    },

    #[error("call produced an unexpected outcome: {outcome}")]
    UnexpectedOutcome { outcome: String },

    #[error("registry storage error: {0}")]
    StorageError(#[from] anyhow::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Coarse classification used by outer surfaces (HTTP status mapping,
/// client retry decisions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller could not be identified (bad signature or key).
    Authentication,
    Authorization,
    NotFound,
    Validation,
    Conflict,
    Internal,
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Unauthorized { .. } | RegistryError::RenounceForbidden { .. } => {
                ErrorKind::Authorization
            }
            RegistryError::NotFound { .. } => ErrorKind::NotFound,
            RegistryError::Validation(_) => ErrorKind::Validation,
            RegistryError::AlreadyRevoked { .. } | RegistryError::InvalidNonce { .. } => {
                ErrorKind::Conflict
            }
            RegistryError::IdsDepleted
            | RegistryError::UnexpectedOutcome { .. }
            | RegistryError::StorageError(_)
            | RegistryError::SerializationError(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::Unauthorized { .. } => "unauthorized",
            RegistryError::RenounceForbidden { .. } => "renounce_forbidden",
            RegistryError::NotFound { .. } => "not_found",
            RegistryError::Validation(_) => "validation_failed",
            RegistryError::AlreadyRevoked { .. } => "already_revoked",
            RegistryError::IdsDepleted => "ids_depleted",
            RegistryError::InvalidNonce { .. } => "invalid_nonce",
            RegistryError::UnexpectedOutcome { .. } => "unexpected_outcome",
            RegistryError::StorageError(_) => "storage_error",
            RegistryError::SerializationError(_) => "serialization_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
