//! Certificate metadata document pinned alongside each certificate file.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use verivault_types::{Address, Fingerprint};

pub const DEFAULT_NAME: &str = "Certificate";
pub const DEFAULT_DESCRIPTION: &str = "VeriVault NFT-based certificate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
}

impl Attribute {
    pub fn new(trait_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.into(),
            value: value.into(),
        }
    }
}

/// NFT-style metadata: display fields, the pinned file and who issued it
/// to whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub name: String,
    pub description: String,
    pub animation_url: String,
    pub file_cid: String,
    pub file_hash_sha256: Fingerprint,
    pub attributes: Vec<Attribute>,
}

impl CertificateMetadata {
    /// Metadata for a pinned file with the standard Recipient, Issuer and
    /// IssueDate attributes.
    pub fn new(
        file_cid: impl Into<String>,
        file_hash_sha256: Fingerprint,
        recipient: Address,
        issuer: Address,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let file_cid = file_cid.into();
        Self {
            name: DEFAULT_NAME.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            animation_url: format!("ipfs://{file_cid}"),
            file_cid,
            file_hash_sha256,
            attributes: vec![
                Attribute::new("Recipient", recipient.to_string()),
                Attribute::new("Issuer", issuer.to_string()),
                Attribute::new(
                    "IssueDate",
                    issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
            ],
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_attribute(mut self, trait_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(trait_type, value));
        self
    }

    pub fn attribute(&self, trait_type: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.trait_type == trait_type)
            .map(|attr| attr.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use verivault_types::sha256;

    #[test]
    fn standard_attributes_are_present() {
        let issued_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let meta = CertificateMetadata::new(
            "bafyfile",
            sha256(b"file"),
            Address([1; 20]),
            Address([2; 20]),
            issued_at,
        );
        assert_eq!(meta.animation_url, "ipfs://bafyfile");
        assert_eq!(meta.attribute("Recipient"), Some(Address([1; 20]).to_string().as_str()));
        assert_eq!(meta.attribute("Issuer"), Some(Address([2; 20]).to_string().as_str()));
        assert_eq!(meta.attribute("IssueDate"), Some("2026-03-01T12:00:00.000Z"));
    }

    #[test]
    fn builder_overrides_display_fields() {
        let meta = CertificateMetadata::new(
            "bafy",
            sha256(b"x"),
            Address([1; 20]),
            Address([2; 20]),
            Utc::now(),
        )
        .with_name("Diploma")
        .with_description("BSc Computer Science")
        .with_attribute("Grade", "A");

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["name"], "Diploma");
        assert_eq!(json["attributes"][3]["trait_type"], "Grade");
        assert_eq!(json["file_hash_sha256"], sha256(b"x").to_hex());
    }
}
