mod error;
pub mod metadata;

pub use crate::error::SdkError;
pub use crate::metadata::{Attribute, CertificateMetadata};

use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;
use verivault_registry::{LocalSigner, Receipt, RegistryCall, RegistryEvent, SignedCall};
use verivault_types::{Address, Fingerprint, Role, TokenId};

/// How often [`VeriVaultClient::execute`] re-signs after a stale nonce.
pub const NONCE_RETRIES: usize = 2;

/// Convenience HTTP client for a VeriVault gateway.
#[derive(Clone)]
pub struct VeriVaultClient {
    base_url: Url,
    http: Client,
}

impl VeriVaultClient {
    /// Create a new client with the provided base URL (e.g. `http://localhost:4000/`).
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, SdkError> {
        Self::with_http_client(
            base_url,
            Client::builder().timeout(Duration::from_secs(30)).build()?,
        )
    }

    /// Use an existing reqwest client (useful for custom TLS or middleware).
    pub fn with_http_client(base_url: impl AsRef<str>, http: Client) -> Result<Self, SdkError> {
        let mut url = Url::parse(base_url.as_ref())
            .map_err(|_| SdkError::InvalidBaseUrl(base_url.as_ref().to_string()))?;
        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_owned();
            path.push('/');
            url.set_path(&path);
        }
        Ok(Self {
            base_url: url,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Pin a certificate file. Returns its content id and sha256 fingerprint.
    pub async fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, SdkError> {
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        let response = self
            .http
            .post(self.endpoint("api/ipfs/upload")?)
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn pin_metadata(&self, metadata: &CertificateMetadata) -> Result<String, SdkError> {
        let pinned: PinnedDocument = self.post("api/ipfs/metadata", metadata).await?;
        Ok(pinned.cid)
    }

    /// Submit a signed call and wait for its receipt.
    pub async fn submit(&self, signed: &SignedCall) -> Result<Receipt, SdkError> {
        self.post("api/tx", signed).await
    }

    /// Next nonce the gateway expects from `address`.
    pub async fn nonce(&self, address: &Address) -> Result<u64, SdkError> {
        let path = format!("api/accounts/{address}/nonce");
        Ok(self.get::<NonceResponse>(&path).await?.nonce)
    }

    pub async fn verify(&self, id: TokenId) -> Result<Verification, SdkError> {
        self.get(&format!("api/verify/{id}")).await
    }

    pub async fn certificates_of(&self, owner: &Address) -> Result<Vec<TokenId>, SdkError> {
        let path = format!("api/accounts/{owner}/certificates");
        Ok(self.get::<CertificatesResponse>(&path).await?.certificates)
    }

    pub async fn has_role(&self, role: Role, account: &Address) -> Result<bool, SdkError> {
        let path = format!("api/roles/{}/{account}", role.name());
        Ok(self.get::<RoleResponse>(&path).await?.has_role)
    }

    /// Sign `call` with the signer's next nonce and submit it. When another
    /// call from the same signer lands in between, the nonce is re-read and
    /// the call signed again, up to [`NONCE_RETRIES`] times.
    pub async fn execute(
        &self,
        signer: &LocalSigner,
        call: RegistryCall,
    ) -> Result<Receipt, SdkError> {
        let mut retries = 0;
        loop {
            let nonce = self.nonce(&signer.address()).await?;
            let signed = signer.sign(call.clone(), nonce)?;
            match self.submit(&signed).await {
                Err(err) if err.is_stale_nonce() && retries < NONCE_RETRIES => {
                    retries += 1;
                    debug!(nonce, retries, method = call.method(), "Nonce moved, re-signing");
                }
                result => return result,
            }
        }
    }

    /// Full issuance flow: pin the file, pin its metadata, then mint a
    /// certificate for `recipient` referencing the metadata.
    pub async fn issue(
        &self,
        signer: &LocalSigner,
        recipient: Address,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<IssuedCertificate, SdkError> {
        let file = self.upload_file(file_name, bytes).await?;
        debug!(cid = %file.cid, "Uploaded certificate file");

        let metadata = CertificateMetadata::new(
            file.cid.clone(),
            file.file_hash_sha256,
            recipient,
            signer.address(),
            Utc::now(),
        );
        let metadata_cid = self.pin_metadata(&metadata).await?;
        let reference = format!("ipfs://{metadata_cid}");

        let receipt = self
            .execute(
                signer,
                RegistryCall::Mint {
                    recipient,
                    reference: reference.clone(),
                    fingerprint: file.file_hash_sha256,
                },
            )
            .await?;
        let id = minted_id(&receipt)
            .ok_or_else(|| SdkError::parse_error("receipt carries no Minted event"))?;

        Ok(IssuedCertificate {
            id,
            file_cid: file.cid,
            metadata_cid,
            reference,
            fingerprint: file.file_hash_sha256,
            receipt,
        })
    }

    pub async fn revoke(&self, signer: &LocalSigner, id: TokenId) -> Result<Receipt, SdkError> {
        self.execute(signer, RegistryCall::Revoke { id }).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, SdkError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SdkError> {
        let response = self.http.get(self.endpoint(path)?).send().await?;
        decode(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, SdkError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await?;
        decode(response).await
    }
}

/// Decode a gateway reply: the JSON body on success, otherwise the
/// gateway's `{code, message}` sorted into a typed [`SdkError`].
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SdkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let bytes = response.bytes().await.unwrap_or_default();
    let rejection = serde_json::from_slice::<GatewayRejection>(&bytes).unwrap_or_else(|_| {
        GatewayRejection {
            code: "http_error".to_string(),
            message: String::from_utf8_lossy(&bytes).into_owned(),
        }
    });
    Err(SdkError::from_gateway(
        status.as_u16(),
        rejection.code,
        rejection.message,
    ))
}

/// Shareable verification page URL for a certificate.
pub fn verify_link(origin: &str, id: TokenId) -> String {
    format!("{}/verify?tokenId={id}", origin.trim_end_matches('/'))
}

fn minted_id(receipt: &Receipt) -> Option<TokenId> {
    receipt.events.iter().find_map(|record| match &record.event {
        RegistryEvent::Minted { id, .. } => Some(*id),
        _ => None,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub cid: String,
    pub file_hash_sha256: Fingerprint,
}

/// Verification document as served by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub token_id: TokenId,
    pub owner: Address,
    pub revoked: bool,
    pub file_hash: Fingerprint,
    #[serde(rename = "tokenURI")]
    pub token_uri: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl Verification {
    /// Whether `bytes` are the file this certificate was issued for.
    pub fn matches_file(&self, bytes: &[u8]) -> bool {
        verivault_types::sha256(bytes) == self.file_hash
    }
}

#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub id: TokenId,
    pub file_cid: String,
    pub metadata_cid: String,
    pub reference: String,
    pub fingerprint: Fingerprint,
    pub receipt: Receipt,
}

#[derive(Debug, Deserialize)]
struct PinnedDocument {
    cid: String,
}

#[derive(Debug, Deserialize)]
struct NonceResponse {
    nonce: u64,
}

#[derive(Debug, Deserialize)]
struct CertificatesResponse {
    certificates: Vec<TokenId>,
}

#[derive(Debug, Deserialize)]
struct RoleResponse {
    has_role: bool,
}

#[derive(Debug, Deserialize)]
struct GatewayRejection {
    code: String,
    #[serde(default)]
    message: String,
}
