use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Path as AxumPath, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use verivault_content_store::{ContentResolver, ContentStore, ContentStoreError};
use verivault_registry::{
    CertificateLedger, CertificateRecord, CertificateRegistry, ErrorKind, EventRecord,
    LedgerError, Receipt, RegistryError, SignedCall,
};
use verivault_types::{Address, Role, TokenId};

use crate::ipfs::{handle_pin_metadata, handle_upload};
use crate::verify::{VerificationDocument, VerificationService};

/// Default cap on request bodies (certificate uploads included).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_EVENT_PAGE: usize = 100;
const MAX_EVENT_PAGE: usize = 1_000;

#[derive(Clone)]
pub struct AppState {
    pub ledger: CertificateLedger,
    pub verifier: VerificationService,
    /// Pinning backend; upload and metadata routes answer 503 without one.
    pub content_store: Option<Arc<dyn ContentStore>>,
    pub ipfs_gateway: String,
    /// Registry persistence mode, reported by `/status`.
    pub registry_store: String,
    pub node_id: String,
    pub metrics: Option<PrometheusHandle>,
    pub max_body_bytes: usize,
    pub start_time: Instant,
    pub req_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(
        registry: Arc<CertificateRegistry>,
        resolver: Arc<dyn ContentResolver>,
        ipfs_gateway: impl Into<String>,
    ) -> Self {
        Self {
            ledger: CertificateLedger::new(registry.clone()),
            verifier: VerificationService::new(registry, resolver),
            content_store: None,
            ipfs_gateway: ipfs_gateway.into(),
            registry_store: "memory".into(),
            node_id: "verivault".into(),
            metrics: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            start_time: Instant::now(),
            req_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn registry(&self) -> &Arc<CertificateRegistry> {
        self.ledger.registry()
    }

    pub(crate) fn record_request(&self, route: &'static str) -> u64 {
        metrics::counter!("verivault_http_requests_total", "route" => route).increment(1);
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

pub(crate) type SharedState = Arc<AppState>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, code: &'static str, message: S) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub(crate) fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub(crate) fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub(crate) fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            code: self.code.to_string(),
            message: self.message,
        });
        (self.status, payload).into_response()
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = status_for(err.kind());
        if status.is_server_error() {
            warn!(error = %err, "Registry failure");
        }
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = status_for(err.kind());
        if status.is_server_error() {
            warn!(error = %err, "Ledger failure");
        }
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<ContentStoreError> for ApiError {
    fn from(err: ContentStoreError) -> Self {
        warn!(error = %err, "Content store failure");
        match err {
            ContentStoreError::Upstream { .. } | ContentStoreError::Http(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "upstream_error", err.to_string())
            }
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

pub async fn start_server<F>(state: AppState, addr: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let listener = bind_listener(addr).await?;
    info!(addr = %listener.local_addr()?, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("gateway server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind gateway listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind gateway listener on {addr}"))
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/metrics", get(handle_metrics))
        .route("/api/ipfs/upload", post(handle_upload))
        .route("/api/ipfs/metadata", post(handle_pin_metadata))
        .route("/api/verify/:token_id", get(handle_verify))
        .route("/api/tx", post(handle_submit_tx))
        .route("/api/certificates/:id", get(handle_get_certificate))
        .route("/api/certificates/:id/owner", get(handle_get_owner))
        .route("/api/roles/:role/:account", get(handle_has_role))
        .route("/api/accounts/:address/nonce", get(handle_get_nonce))
        .route(
            "/api/accounts/:address/certificates",
            get(handle_list_certificates),
        )
        .route("/api/events", get(handle_list_events))
        .route("/api/registry", get(handle_registry_info))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub node_id: String,
    pub version: String,
    pub uptime_secs: u64,
    pub registry_version: u64,
    pub total_minted: u64,
    pub req_total: u64,
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let req_total = state.record_request("health");
    let snapshot = state.registry().snapshot();
    Json(HealthResponse {
        ok: true,
        node_id: state.node_id.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_seconds(),
        registry_version: snapshot.version,
        total_minted: snapshot.total_minted(),
        req_total,
    })
}

/// Which collaborators are configured. Never includes secret values.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub content_store: Option<String>,
    pub ipfs_gateway: String,
    pub registry_store: String,
    pub metrics_enabled: bool,
    pub req_total: u64,
}

async fn handle_status(State(state): State<SharedState>) -> Json<StatusResponse> {
    let req_total = state.record_request("status");
    Json(StatusResponse {
        content_store: state
            .content_store
            .as_ref()
            .map(|store| store.backend().to_string()),
        ipfs_gateway: state.ipfs_gateway.clone(),
        registry_store: state.registry_store.clone(),
        metrics_enabled: state.metrics.is_some(),
        req_total,
    })
}

async fn handle_metrics(State(state): State<SharedState>) -> Result<Response, ApiError> {
    state.record_request("metrics");
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("metrics exporter is disabled"))?;

    let mut response = handle.render().into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    Ok(response)
}

async fn handle_verify(
    State(state): State<SharedState>,
    AxumPath(token_id): AxumPath<String>,
) -> Result<Json<VerificationDocument>, ApiError> {
    state.record_request("verify");
    let id = parse_token_id(&token_id)?;
    let document = state.verifier.verify(id).await?;
    Ok(Json(document))
}

async fn handle_submit_tx(
    State(state): State<SharedState>,
    payload: Result<Json<SignedCall>, JsonRejection>,
) -> Result<Json<Receipt>, ApiError> {
    state.record_request("tx");
    let Json(signed) = payload?;
    let method = signed.call.method();

    let ledger = state.ledger.clone();
    let result = tokio::task::spawn_blocking(move || ledger.execute(&signed))
        .await
        .map_err(|err| ApiError::internal(format!("transaction task failed: {err}")))?;

    match result {
        Ok(receipt) => {
            metrics::counter!("verivault_calls_total", "method" => method, "result" => "accepted")
                .increment(1);
            Ok(Json(receipt))
        }
        Err(err) => {
            metrics::counter!("verivault_calls_total", "method" => method, "result" => "rejected")
                .increment(1);
            Err(err.into())
        }
    }
}

async fn handle_get_certificate(
    State(state): State<SharedState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<CertificateRecord>, ApiError> {
    state.record_request("certificate");
    let id = parse_token_id(&id)?;
    let snapshot = state.registry().snapshot();
    let record = snapshot
        .record(id)
        .cloned()
        .ok_or(RegistryError::NotFound { id })?;
    Ok(Json(record))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerResponse {
    pub id: TokenId,
    pub owner: Address,
}

async fn handle_get_owner(
    State(state): State<SharedState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<OwnerResponse>, ApiError> {
    state.record_request("owner");
    let id = parse_token_id(&id)?;
    let owner = state.registry().owner_of(id)?;
    Ok(Json(OwnerResponse { id, owner }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleResponse {
    pub role: Role,
    pub role_id: String,
    pub account: Address,
    pub has_role: bool,
}

async fn handle_has_role(
    State(state): State<SharedState>,
    AxumPath((role, account)): AxumPath<(String, String)>,
) -> Result<Json<RoleResponse>, ApiError> {
    state.record_request("role");
    let role: Role = role
        .parse()
        .map_err(|err| ApiError::bad_request(format!("{err}")))?;
    let account = parse_address(&account)?;
    Ok(Json(RoleResponse {
        role,
        role_id: role.id().to_hex(),
        account,
        has_role: state.registry().has_role(role, &account),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub address: Address,
    pub nonce: u64,
}

async fn handle_get_nonce(
    State(state): State<SharedState>,
    AxumPath(address): AxumPath<String>,
) -> Result<Json<NonceResponse>, ApiError> {
    state.record_request("nonce");
    let address = parse_address(&address)?;
    Ok(Json(NonceResponse {
        address,
        nonce: state.registry().nonce_of(&address),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CertificatesResponse {
    pub address: Address,
    pub certificates: Vec<TokenId>,
    pub total: u64,
}

async fn handle_list_certificates(
    State(state): State<SharedState>,
    AxumPath(address): AxumPath<String>,
) -> Result<Json<CertificatesResponse>, ApiError> {
    state.record_request("certificates");
    let address = parse_address(&address)?;
    let certificates = state.registry().certificates_of(&address);
    Ok(Json(CertificatesResponse {
        address,
        total: certificates.len() as u64,
        certificates,
    }))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    from: Option<u64>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<EventRecord>,
    /// Sequence number to pass as `from` for the next page.
    pub next: u64,
}

async fn handle_list_events(
    State(state): State<SharedState>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<EventsResponse>, ApiError> {
    state.record_request("events");
    let Query(query) = query?;
    let from = query.from.unwrap_or(0);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_PAGE)
        .clamp(1, MAX_EVENT_PAGE);

    let events = state.registry().events_since(from, limit)?;
    let next = events.last().map(|e| e.seq + 1).unwrap_or(from);
    Ok(Json(EventsResponse { events, next }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryInfoResponse {
    pub name: String,
    pub symbol: String,
    pub version: u64,
    pub total_minted: u64,
    pub event_count: u64,
    pub admins: Vec<Address>,
    pub issuers: Vec<Address>,
}

async fn handle_registry_info(State(state): State<SharedState>) -> Json<RegistryInfoResponse> {
    state.record_request("registry");
    let snapshot = state.registry().snapshot();
    Json(RegistryInfoResponse {
        name: snapshot.name.clone(),
        symbol: snapshot.symbol.clone(),
        version: snapshot.version,
        total_minted: snapshot.total_minted(),
        event_count: snapshot.event_count,
        admins: snapshot.roles().holders(Role::Admin),
        issuers: snapshot.roles().holders(Role::Issuer),
    })
}

fn parse_token_id(value: &str) -> Result<TokenId, ApiError> {
    value
        .parse::<TokenId>()
        .map_err(|_| ApiError::bad_request(format!("invalid token id: {value}")))
}

fn parse_address(value: &str) -> Result<Address, ApiError> {
    value
        .parse::<Address>()
        .map_err(|err| ApiError::bad_request(format!("invalid address {value}: {err}")))
}
