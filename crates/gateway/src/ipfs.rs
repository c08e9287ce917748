//! Pinning endpoints for certificate files and metadata documents.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use verivault_content_store::{ContentId, ContentStore};
use verivault_types::sha256;

use crate::server::{ApiError, SharedState};

const FILE_FIELD: &str = "file";
const DEFAULT_FILE_NAME: &str = "certificate";

/// Response from `POST /api/ipfs/upload`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub cid: ContentId,
    /// `0x` + hex sha256 of the uploaded bytes; used as the certificate
    /// fingerprint at mint time.
    pub file_hash_sha256: String,
    pub size: u64,
}

/// Response from `POST /api/ipfs/metadata`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PinResponse {
    pub cid: ContentId,
}

fn content_store(state: &SharedState) -> Result<Arc<dyn ContentStore>, ApiError> {
    state
        .content_store
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("content store is not configured"))
}

pub(crate) async fn handle_upload(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    state.record_request("ipfs_upload");
    let store = content_store(&state)?;
    let mut multipart =
        multipart.map_err(|err| ApiError::bad_request(format!("expected multipart body: {err}")))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("malformed multipart body: {err}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(format!("failed to read file: {err}")))?;

        let file_hash = sha256(&bytes);
        debug!(%file_name, size = bytes.len(), "Pinning uploaded file");
        let receipt = store.put(&file_name, bytes.to_vec()).await?;
        info!(cid = %receipt.cid, %file_hash, "Pinned certificate file");

        return Ok(Json(UploadResponse {
            cid: receipt.cid,
            file_hash_sha256: file_hash.to_hex(),
            size: receipt.size,
        }));
    }

    Err(ApiError::bad_request("file is required"))
}

pub(crate) async fn handle_pin_metadata(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PinResponse>, ApiError> {
    state.record_request("ipfs_metadata");
    let store = content_store(&state)?;
    let Json(document) = payload?;

    let receipt = store.put_json(&document).await?;
    info!(cid = %receipt.cid, "Pinned certificate metadata");
    Ok(Json(PinResponse { cid: receipt.cid }))
}
