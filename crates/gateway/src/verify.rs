//! Certificate verification: registry record plus resolved metadata.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use verivault_content_store::{ContentResolver, Locator};
use verivault_registry::{CertificateRegistry, RegistryError};
use verivault_types::{Address, Fingerprint, TokenId};

/// Document returned by `GET /api/verify/:token_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDocument {
    pub token_id: TokenId,
    pub owner: Address,
    pub revoked: bool,
    pub file_hash: Fingerprint,
    #[serde(rename = "tokenURI")]
    pub token_uri: String,
    /// `null` when the reference cannot be resolved to a JSON document.
    pub metadata: Option<Value>,
}

#[derive(Clone)]
pub struct VerificationService {
    registry: Arc<CertificateRegistry>,
    resolver: Arc<dyn ContentResolver>,
}

impl VerificationService {
    pub fn new(registry: Arc<CertificateRegistry>, resolver: Arc<dyn ContentResolver>) -> Self {
        Self { registry, resolver }
    }

    pub async fn verify(&self, id: TokenId) -> Result<VerificationDocument, RegistryError> {
        let view = self.registry.verify(id)?;

        let metadata = match Locator::parse(&view.reference) {
            Ok(locator) => self.resolver.fetch_json(&locator).await,
            Err(err) => {
                debug!(%id, reference = %view.reference, error = %err, "Reference is not a locator");
                None
            }
        };

        Ok(VerificationDocument {
            token_id: id,
            owner: view.owner,
            revoked: view.revoked,
            file_hash: view.fingerprint,
            token_uri: view.reference,
            metadata,
        })
    }
}
