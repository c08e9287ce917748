//! Router-level tests for the gateway endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use verivault_content_store::{ContentStore, MemoryContentStore};
use verivault_gateway::{build_router, AppState};
use verivault_registry::{CertificateRegistry, LocalSigner, RegistryCall};
use verivault_types::{keccak256, sha256, Address, Role, TokenId};

struct Harness {
    app: Router,
    registry: Arc<CertificateRegistry>,
    content: MemoryContentStore,
    admin: LocalSigner,
}

fn harness(with_store: bool) -> Harness {
    let admin = LocalSigner::from_seed([7u8; 32]);
    let registry =
        Arc::new(CertificateRegistry::in_memory("VeriVault", "CERT", admin.address()).unwrap());
    let content = MemoryContentStore::new();

    let mut state = AppState::new(
        registry.clone(),
        Arc::new(content.clone()),
        "https://gateway.pinata.cloud/ipfs/",
    );
    if with_store {
        state.content_store = Some(Arc::new(content.clone()));
    }

    Harness {
        app: build_router(state),
        registry,
        content,
        admin,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn multipart(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "verivault-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/ipfs/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn mint_call(recipient: Address, reference: &str) -> RegistryCall {
    RegistryCall::Mint {
        recipient,
        reference: reference.to_string(),
        fingerprint: keccak256(reference),
    }
}

#[tokio::test]
async fn health_reports_registry_progress() {
    let h = harness(false);
    h.registry
        .mint(&h.admin.address(), Address([1; 20]), "ipfs://a", keccak256(b"a"))
        .unwrap();

    let (status, body) = send(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["total_minted"], json!(1));
    assert_eq!(body["registry_version"], json!(1));
}

#[tokio::test]
async fn status_lists_collaborators_without_secrets() {
    let (status, body) = send(&harness(true).app, get("/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content_store"], json!("memory"));
    assert_eq!(body["metrics_enabled"], json!(false));

    let (_, body) = send(&harness(false).app, get("/status")).await;
    assert_eq!(body["content_store"], Value::Null);
}

#[tokio::test]
async fn verify_returns_record_with_resolved_metadata() {
    let h = harness(true);
    let metadata = json!({ "name": "Certificate", "file_cid": "bafyfile" });
    let pinned = h.content.put_json(&metadata).await.unwrap();
    let reference = pinned.cid.locator().to_string();
    let fingerprint = sha256(b"diploma");
    let owner = Address([0xA1; 20]);

    h.registry
        .mint(&h.admin.address(), owner, reference.clone(), fingerprint)
        .unwrap();

    let (status, body) = send(&h.app, get("/api/verify/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokenId"], json!(1));
    assert_eq!(body["owner"], json!(owner.to_string()));
    assert_eq!(body["revoked"], json!(false));
    assert_eq!(body["fileHash"], json!(fingerprint.to_hex()));
    assert_eq!(body["tokenURI"], json!(reference));
    assert_eq!(body["metadata"], metadata);

    h.registry.revoke(&h.admin.address(), TokenId(1)).unwrap();
    let (_, body) = send(&h.app, get("/api/verify/1")).await;
    assert_eq!(body["revoked"], json!(true));
}

#[tokio::test]
async fn verify_tolerates_unresolvable_metadata() {
    let h = harness(false);
    h.registry
        .mint(
            &h.admin.address(),
            Address([0xA1; 20]),
            "not-a-locator",
            keccak256(b"x"),
        )
        .unwrap();

    let (status, body) = send(&h.app, get("/api/verify/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"], Value::Null);
}

#[tokio::test]
async fn verify_maps_missing_and_malformed_ids() {
    let h = harness(false);

    let (status, body) = send(&h.app, get("/api/verify/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("not_found"));

    let (status, _) = send(&h.app, get("/api/verify/0")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&h.app, get("/api/verify/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("bad_request"));
}

#[tokio::test]
async fn upload_requires_a_configured_store() {
    let h = harness(false);
    let (status, body) = send(&h.app, multipart("file", "a.pdf", b"pdf")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], json!("unavailable"));

    let (status, _) = send(&h.app, post_json("/api/ipfs/metadata", &json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn upload_pins_file_and_reports_sha256() {
    let h = harness(true);
    let (status, body) = send(&h.app, multipart("file", "diploma.pdf", b"%PDF-1.7 body")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file_hash_sha256"], json!(sha256(b"%PDF-1.7 body").to_hex()));
    assert_eq!(body["size"], json!(13));
    assert!(body["cid"].as_str().is_some());
    assert_eq!(h.content.len(), 1);
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let h = harness(true);
    let (status, body) = send(&h.app, multipart("other", "a.pdf", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("file is required"));
    assert!(h.content.is_empty());
}

#[tokio::test]
async fn metadata_pin_round_trips_through_verification() {
    let h = harness(true);
    let doc = json!({ "name": "Certificate", "attributes": [] });
    let (status, body) = send(&h.app, post_json("/api/ipfs/metadata", &doc)).await;
    assert_eq!(status, StatusCode::OK);
    let cid = body["cid"].as_str().unwrap().to_string();

    h.registry
        .mint(
            &h.admin.address(),
            Address([2; 20]),
            format!("ipfs://{cid}"),
            keccak256(b"f"),
        )
        .unwrap();
    let (_, body) = send(&h.app, get("/api/verify/1")).await;
    assert_eq!(body["metadata"], doc);
}

#[tokio::test]
async fn signed_mint_is_executed_once() {
    let h = harness(false);
    let signed = h
        .admin
        .sign(mint_call(Address([0xA1; 20]), "ipfs://bafy"), 0)
        .unwrap();
    let payload = serde_json::to_value(&signed).unwrap();

    let (status, body) = send(&h.app, post_json("/api/tx", &payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["kind"], json!("minted"));
    assert_eq!(body["outcome"]["id"], json!(1));
    assert_eq!(body["caller"], json!(h.admin.address().to_string()));
    assert_eq!(body["events"][0]["event"], json!("Minted"));

    let (status, body) = send(&h.app, post_json("/api/tx", &payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("invalid_nonce"));

    let uri = format!("/api/accounts/{}/nonce", h.admin.address());
    let (_, body) = send(&h.app, get(&uri)).await;
    assert_eq!(body["nonce"], json!(1));
}

#[tokio::test]
async fn tx_errors_map_to_statuses() {
    let h = harness(false);
    let outsider = LocalSigner::from_seed([9u8; 32]);

    let forged = outsider
        .sign(mint_call(Address([0xA1; 20]), "ipfs://forged"), 0)
        .unwrap();
    let (status, body) = send(&h.app, post_json("/api/tx", &serde_json::to_value(&forged).unwrap())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], json!("unauthorized"));

    let mut tampered = h
        .admin
        .sign(mint_call(Address([0xA1; 20]), "ipfs://x"), 0)
        .unwrap();
    tampered.nonce = 5;
    let (status, body) = send(&h.app, post_json("/api/tx", &serde_json::to_value(&tampered).unwrap())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!("bad_signature"));

    let missing = h
        .admin
        .sign(RegistryCall::Revoke { id: TokenId(42) }, 0)
        .unwrap();
    let (status, _) = send(&h.app, post_json("/api/tx", &serde_json::to_value(&missing).unwrap())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let invalid = h.admin.sign(mint_call(Address::ZERO, "ipfs://x"), 0).unwrap();
    let (status, body) = send(&h.app, post_json("/api/tx", &serde_json::to_value(&invalid).unwrap())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("validation_failed"));

    let (status, _) = send(&h.app, post_json("/api/tx", &json!({ "call": "nonsense" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn double_revoke_is_a_conflict() {
    let h = harness(false);
    h.registry
        .mint(&h.admin.address(), Address([1; 20]), "ipfs://a", keccak256(b"a"))
        .unwrap();

    let first = h.admin.sign(RegistryCall::Revoke { id: TokenId(1) }, 0).unwrap();
    let (status, _) = send(&h.app, post_json("/api/tx", &serde_json::to_value(&first).unwrap())).await;
    assert_eq!(status, StatusCode::OK);

    let second = h.admin.sign(RegistryCall::Revoke { id: TokenId(1) }, 1).unwrap();
    let (status, body) = send(&h.app, post_json("/api/tx", &serde_json::to_value(&second).unwrap())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("already_revoked"));
}

#[tokio::test]
async fn read_endpoints_expose_registry_state() {
    let h = harness(false);
    let admin = h.admin.address();
    let alice = Address([0xA1; 20]);
    h.registry.grant_role(&admin, Role::Issuer, Address([5; 20])).unwrap();
    h.registry.mint(&admin, alice, "ipfs://one", keccak256(b"1")).unwrap();
    h.registry.mint(&admin, alice, "ipfs://two", keccak256(b"2")).unwrap();

    let (status, body) = send(&h.app, get("/api/certificates/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reference"], json!("ipfs://two"));

    let (_, body) = send(&h.app, get("/api/certificates/1/owner")).await;
    assert_eq!(body["owner"], json!(alice.to_string()));

    let (_, body) = send(&h.app, get(&format!("/api/accounts/{alice}/certificates"))).await;
    assert_eq!(body["certificates"], json!([1, 2]));

    let (_, body) = send(&h.app, get(&format!("/api/roles/issuer/{}", Address([5; 20])))).await;
    assert_eq!(body["has_role"], json!(true));
    assert_eq!(body["role"], json!("ISSUER"));

    let (_, body) = send(&h.app, get(&format!("/api/roles/admin/{alice}"))).await;
    assert_eq!(body["has_role"], json!(false));

    let (status, _) = send(&h.app, get("/api/roles/owner/0x00")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&h.app, get("/api/registry")).await;
    assert_eq!(body["name"], json!("VeriVault"));
    assert_eq!(body["total_minted"], json!(2));
    assert_eq!(body["issuers"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn events_are_paginated_by_sequence() {
    let h = harness(false);
    let admin = h.admin.address();
    for n in 0u8..3 {
        h.registry
            .mint(&admin, Address([1; 20]), "ipfs://x", keccak256([n]))
            .unwrap();
    }

    let (status, body) = send(&h.app, get("/api/events?from=0&limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["next"], json!(2));

    let (_, body) = send(&h.app, get("/api/events?from=2")).await;
    let events = body["events"].as_array().cloned().unwrap_or_default();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e["event"] == json!("Minted")));
    assert_eq!(body["next"], json!(5));

    let (status, _) = send(&h.app, get("/api/events?from=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
