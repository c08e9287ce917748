//! VeriVault HTTP gateway
//!
//! Serves verification lookups, accepts signed registry calls and fronts
//! the content store for certificate uploads.

pub mod ipfs;
pub mod server;
pub mod verify;

pub use ipfs::{PinResponse, UploadResponse};
pub use server::{
    build_router, start_server, ApiError, AppState, CertificatesResponse, ErrorResponse,
    EventsResponse, HealthResponse, NonceResponse, OwnerResponse, RegistryInfoResponse,
    RoleResponse, StatusResponse, DEFAULT_MAX_BODY_BYTES,
};
pub use verify::{VerificationDocument, VerificationService};
