use thiserror::Error;

/// Errors raised while pinning or resolving content.
#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("invalid content locator: {0}")]
    InvalidLocator(String),
    #[error("invalid content id: {0}")]
    InvalidContentId(String),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("pinning service rejected request (status {status}): {body}")]
    Upstream { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Parse(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ContentStoreError {
    pub(crate) fn upstream(status: u16, body: impl Into<String>) -> Self {
        ContentStoreError::Upstream {
            status,
            body: body.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContentStoreError>;
