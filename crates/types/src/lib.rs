//! Shared primitive types for the VeriVault certificate registry.
//!
//! Everything here is plain data: account addresses, 32-byte digests,
//! role identifiers and token ids, together with their canonical hex and
//! decimal encodings.

pub mod address;
pub mod hash;
pub mod role;
pub mod token;

pub use address::*;
pub use hash::*;
pub use role::*;
pub use token::*;
