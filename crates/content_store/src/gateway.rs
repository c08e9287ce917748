//! Resolves certificate metadata over an HTTP IPFS gateway.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::locator::Locator;
use crate::store::ContentResolver;

pub const DEFAULT_IPFS_GATEWAY: &str = "https://gateway.pinata.cloud/ipfs/";

#[derive(Debug, Clone)]
pub struct GatewayResolver {
    base: String,
    http: Client,
}

impl GatewayResolver {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base, Duration::from_secs(10))
    }

    pub fn with_timeout(base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: base.into(),
            http,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

#[async_trait]
impl ContentResolver for GatewayResolver {
    async fn fetch_json(&self, locator: &Locator) -> Option<Value> {
        let url = match locator.gateway_url(&self.base) {
            Ok(url) => url,
            Err(err) => {
                debug!(%locator, error = %err, "Locator has no gateway mapping");
                return None;
            }
        };

        let response = match self.http.get(url.clone()).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(%url, error = %err, "Metadata fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(%url, status = response.status().as_u16(), "Metadata fetch returned error status");
            return None;
        }
        response.json::<Value>().await.ok()
    }
}
