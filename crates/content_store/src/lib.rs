//! VeriVault content store
//!
//! Certificate files and their metadata documents live off-ledger in a
//! content-addressed store. The registry only records a locator
//! (`ipfs://<cid>`) and a fingerprint of the file. This crate provides the
//! pinning side ([`ContentStore`]) and the best-effort lookup side
//! ([`ContentResolver`]) with Pinata, HTTP gateway and in-memory backends.

pub mod error;
pub mod gateway;
pub mod locator;
pub mod pinata;
pub mod store;

pub use error::{ContentStoreError, Result};
pub use gateway::{GatewayResolver, DEFAULT_IPFS_GATEWAY};
pub use locator::{ContentId, Locator, IPFS_SCHEME};
pub use pinata::{PinataConfig, PinataStore, DEFAULT_PIN_FILE_URL, DEFAULT_PIN_JSON_URL};
pub use store::{ContentResolver, ContentStore, MemoryContentStore, PinReceipt};
