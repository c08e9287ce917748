//! Pinata pinning service client.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ContentStoreError, Result};
use crate::locator::ContentId;
use crate::store::{ContentStore, PinReceipt};

pub const DEFAULT_PIN_FILE_URL: &str = "https://api.pinata.cloud/pinning/pinFileToIPFS";
pub const DEFAULT_PIN_JSON_URL: &str = "https://api.pinata.cloud/pinning/pinJSONToIPFS";

#[derive(Debug, Clone)]
pub struct PinataConfig {
    pub jwt: String,
    pub pin_file_url: Url,
    pub pin_json_url: Url,
    pub timeout: Duration,
}

impl PinataConfig {
    /// Configuration for the public Pinata API.
    pub fn new(jwt: impl Into<String>) -> Result<Self> {
        Ok(Self {
            jwt: jwt.into(),
            pin_file_url: Url::parse(DEFAULT_PIN_FILE_URL)?,
            pin_json_url: Url::parse(DEFAULT_PIN_JSON_URL)?,
            timeout: Duration::from_secs(60),
        })
    }

    pub fn with_endpoints(mut self, pin_file_url: Url, pin_json_url: Url) -> Self {
        self.pin_file_url = pin_file_url;
        self.pin_json_url = pin_json_url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinataPinResponse {
    ipfs_hash: String,
    #[serde(default)]
    pin_size: u64,
    #[serde(default)]
    timestamp: String,
}

/// Pins content through Pinata's HTTP API using a bearer JWT.
#[derive(Clone)]
pub struct PinataStore {
    config: PinataConfig,
    http: Client,
}

impl std::fmt::Debug for PinataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinataStore")
            .field("pin_file_url", &self.config.pin_file_url.as_str())
            .field("pin_json_url", &self.config.pin_json_url.as_str())
            .finish_non_exhaustive()
    }
}

impl PinataStore {
    pub fn new(config: PinataConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.config.jwt)
    }

    async fn into_receipt(response: Response) -> Result<PinReceipt> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %body, "Pinata request failed");
            return Err(ContentStoreError::upstream(status.as_u16(), body));
        }
        let pinned: PinataPinResponse = response
            .json()
            .await
            .map_err(|e| ContentStoreError::Parse(e.to_string()))?;
        Ok(PinReceipt {
            cid: ContentId::new(pinned.ipfs_hash)?,
            size: pinned.pin_size,
            timestamp: pinned.timestamp,
        })
    }
}

#[async_trait]
impl ContentStore for PinataStore {
    async fn put(&self, file_name: &str, bytes: Vec<u8>) -> Result<PinReceipt> {
        let size = bytes.len();
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let response = self
            .authorized(self.http.post(self.config.pin_file_url.clone()))
            .multipart(form)
            .send()
            .await?;
        let receipt = Self::into_receipt(response).await?;
        debug!(file_name, size, cid = %receipt.cid, "Pinned file");
        Ok(receipt)
    }

    async fn put_json(&self, document: &Value) -> Result<PinReceipt> {
        let response = self
            .authorized(self.http.post(self.config.pin_json_url.clone()))
            .json(document)
            .send()
            .await?;
        let receipt = Self::into_receipt(response).await?;
        debug!(cid = %receipt.cid, "Pinned JSON document");
        Ok(receipt)
    }

    fn backend(&self) -> &'static str {
        "pinata"
    }
}
