//! Content identifiers and the `scheme://id` locators stored as certificate
//! references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{ContentStoreError, Result};

pub const IPFS_SCHEME: &str = "ipfs";

/// Identifier assigned by a content store (an IPFS CID for pinned content).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() || trimmed.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(ContentStoreError::InvalidContentId(id));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `ipfs://<id>`
    pub fn locator(&self) -> Locator {
        Locator::ipfs(self)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentId {
    type Error = ContentStoreError;

    fn try_from(value: String) -> Result<Self> {
        ContentId::new(value)
    }
}

impl From<ContentId> for String {
    fn from(value: ContentId) -> Self {
        value.0
    }
}

/// Parsed form of a certificate reference such as `ipfs://bafy.../meta.json`
/// or `https://example.org/cert.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    scheme: String,
    id: String,
}

impl Locator {
    pub fn ipfs(cid: &ContentId) -> Self {
        Self {
            scheme: IPFS_SCHEME.to_string(),
            id: cid.as_str().to_string(),
        }
    }

    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        let (scheme, id) = reference
            .split_once("://")
            .ok_or_else(|| ContentStoreError::InvalidLocator(reference.to_string()))?;
        if scheme.is_empty()
            || id.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(ContentStoreError::InvalidLocator(reference.to_string()));
        }
        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            id: id.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_ipfs(&self) -> bool {
        self.scheme == IPFS_SCHEME
    }

    /// Root content id of an `ipfs://` locator (the part before any path).
    pub fn content_id(&self) -> Option<ContentId> {
        if !self.is_ipfs() {
            return None;
        }
        let root = self.id.split('/').next().unwrap_or_default();
        ContentId::new(root).ok()
    }

    /// HTTP location of this content. `ipfs://` locators are placed under
    /// `gateway_base`; `http(s)://` locators are returned unchanged.
    pub fn gateway_url(&self, gateway_base: &str) -> Result<Url> {
        match self.scheme.as_str() {
            IPFS_SCHEME => {
                let mut base = gateway_base.trim().to_string();
                if !base.ends_with('/') {
                    base.push('/');
                }
                Ok(Url::parse(&format!("{base}{}", self.id))?)
            }
            "http" | "https" => Ok(Url::parse(&self.to_string())?),
            _ => Err(ContentStoreError::InvalidLocator(self.to_string())),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.id)
    }
}

impl FromStr for Locator {
    type Err = ContentStoreError;

    fn from_str(s: &str) -> Result<Self> {
        Locator::parse(s)
    }
}
