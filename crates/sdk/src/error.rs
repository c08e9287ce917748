use thiserror::Error;
use verivault_registry::LedgerError;

/// Errors returned by [`VeriVaultClient`](crate::VeriVaultClient).
///
/// Gateway rejections are sorted by what the caller can do about them; the
/// gateway's stable code is kept on every variant.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Bad signature, or the signer lacks the role the call needs.
    #[error("not permitted ({code}): {message}")]
    Unauthorized {
        status: u16,
        code: String,
        message: String,
    },
    #[error("not found: {message}")]
    NotFound { code: String, message: String },
    /// Already revoked, or the nonce moved under us.
    #[error("conflict ({code}): {message}")]
    Conflict { code: String, message: String },
    #[error("rejected ({code}): {message}")]
    Rejected { code: String, message: String },
    /// No content store configured, or the pinning service failed.
    #[error("gateway unavailable (status {status}, code {code}): {message}")]
    Unavailable {
        status: u16,
        code: String,
        message: String,
    },
    #[error("server error (status {status}, code {code}): {message}")]
    ServerError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("signing error: {0}")]
    Signing(#[from] LedgerError),
    #[error("parse error: {0}")]
    Parse(String),
}

pub(crate) const INVALID_NONCE: &str = "invalid_nonce";
pub(crate) const ALREADY_REVOKED: &str = "already_revoked";

impl SdkError {
    pub(crate) fn parse_error(msg: impl Into<String>) -> Self {
        SdkError::Parse(msg.into())
    }

    /// Classify a gateway `{code, message}` rejection by HTTP status.
    pub(crate) fn from_gateway(status: u16, code: String, message: String) -> Self {
        match status {
            401 | 403 => SdkError::Unauthorized {
                status,
                code,
                message,
            },
            404 => SdkError::NotFound { code, message },
            409 => SdkError::Conflict { code, message },
            400 | 413 | 422 => SdkError::Rejected { code, message },
            502 | 503 | 504 => SdkError::Unavailable {
                status,
                code,
                message,
            },
            _ => SdkError::ServerError {
                status,
                code,
                message,
            },
        }
    }

    /// Stable error code reported by the gateway, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            SdkError::Unauthorized { code, .. }
            | SdkError::NotFound { code, .. }
            | SdkError::Conflict { code, .. }
            | SdkError::Rejected { code, .. }
            | SdkError::Unavailable { code, .. }
            | SdkError::ServerError { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_already_revoked(&self) -> bool {
        matches!(self, SdkError::Conflict { code, .. } if code == ALREADY_REVOKED)
    }

    /// Another call from the same signer landed first; re-read the nonce and
    /// sign again.
    pub fn is_stale_nonce(&self) -> bool {
        matches!(self, SdkError::Conflict { code, .. } if code == INVALID_NONCE)
    }
}
