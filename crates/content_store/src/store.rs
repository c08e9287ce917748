//! Content store traits and the in-memory backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::locator::{ContentId, Locator};

/// Acknowledgement for pinned content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinReceipt {
    pub cid: ContentId,
    /// Stored size in bytes as reported by the backend.
    pub size: u64,
    /// Backend-reported pin time (RFC 3339).
    pub timestamp: String,
}

/// Write side: pins certificate files and metadata documents.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, file_name: &str, bytes: Vec<u8>) -> Result<PinReceipt>;

    async fn put_json(&self, document: &Value) -> Result<PinReceipt>;

    /// Short backend name for status reporting.
    fn backend(&self) -> &'static str;
}

/// Read side: fetches metadata documents by locator.
///
/// Resolution is best effort. Missing content, non-success responses and
/// non-JSON bodies all yield `None`.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn fetch_json(&self, locator: &Locator) -> Option<Value>;
}

/// Content-addressed in-memory store (for tests and local development).
///
/// Ids are the hex blake3 digest of the stored bytes, so identical content
/// always maps to the same id.
#[derive(Clone, Default)]
pub struct MemoryContentStore {
    blobs: Arc<RwLock<HashMap<ContentId, Vec<u8>>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cid: &ContentId) -> Option<Vec<u8>> {
        self.blobs.read().get(cid).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    fn insert(&self, bytes: Vec<u8>) -> Result<PinReceipt> {
        let cid = ContentId::new(hex::encode(blake3::hash(&bytes).as_bytes()))?;
        let size = bytes.len() as u64;
        self.blobs.write().insert(cid.clone(), bytes);
        Ok(PinReceipt {
            cid,
            size,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, file_name: &str, bytes: Vec<u8>) -> Result<PinReceipt> {
        tracing::debug!(file_name, size = bytes.len(), "Storing content in memory");
        self.insert(bytes)
    }

    async fn put_json(&self, document: &Value) -> Result<PinReceipt> {
        self.insert(serde_json::to_vec(document)?)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl ContentResolver for MemoryContentStore {
    async fn fetch_json(&self, locator: &Locator) -> Option<Value> {
        let cid = locator.content_id()?;
        let bytes = self.get(&cid)?;
        serde_json::from_slice(&bytes).ok()
    }
}
