//! VeriVault certificate registry.
//!
//! The registry keeps certificate records keyed by a dense, sequential
//! [`TokenId`](verivault_types::TokenId). Every mutation is a pure
//! transition over an explicit [`RegistryState`]: the transition returns the
//! next state plus the events it emitted, or an error and no change at all.
//! [`CertificateRegistry`] wraps that function with a single writer, a
//! durable [`RegistryStore`] and lock-free snapshot reads.

pub mod access;
pub mod errors;
pub mod ledger;
pub mod registry;
pub mod state;
pub mod store;
pub mod transition;
pub mod types;

pub use errors::*;
pub use ledger::{signing_digest, CertificateLedger, LedgerError, LocalSigner, Receipt, SignedCall};
pub use registry::{CertificateRegistry, Committed};
pub use state::{RegistryState, RoleTable};
pub use store::{MemoryRegistryStore, RegistryStore, SledRegistryStore};
pub use transition::{apply, apply_with_nonce, deploy, validate_mint, Transition};
pub use types::*;
