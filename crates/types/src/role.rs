//! Capability roles recognised by the registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::hash::{keccak256, Bytes32};

/// A registry capability.
///
/// `Admin` manages role assignments; `Issuer` may mint and revoke
/// certificates. Role ids follow the usual access-control convention: the
/// admin role is 32 zero bytes and every other role is the keccak-256 of its
/// upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Issuer,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 2] = [Role::Admin, Role::Issuer];

    /// Canonical on-ledger name.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "DEFAULT_ADMIN_ROLE",
            Role::Issuer => "ISSUER_ROLE",
        }
    }

    /// 32-byte role identifier.
    pub fn id(&self) -> Bytes32 {
        match self {
            Role::Admin => Bytes32::ZERO,
            Role::Issuer => keccak256(self.name().as_bytes()),
        }
    }

    pub fn from_id(id: &Bytes32) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.id() == *id)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts role names (`admin`, `DEFAULT_ADMIN_ROLE`, `issuer`,
    /// `ISSUER_ROLE`, any case) or a role id in hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "ADMIN" | "DEFAULT_ADMIN_ROLE" => return Ok(Role::Admin),
            "ISSUER" | "ISSUER_ROLE" => return Ok(Role::Issuer),
            _ => {}
        }
        Bytes32::from_hex(trimmed)
            .ok()
            .and_then(|id| Role::from_id(&id))
            .ok_or_else(|| UnknownRole(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_role_id_is_zero() {
        assert!(Role::Admin.id().is_zero());
    }

    #[test]
    fn issuer_role_id_is_keccak_of_name() {
        assert_eq!(Role::Issuer.id(), keccak256(b"ISSUER_ROLE"));
        assert_eq!(Role::from_id(&Role::Issuer.id()), Some(Role::Issuer));
    }

    #[test]
    fn parses_names_and_ids() {
        assert_eq!("issuer".parse::<Role>().unwrap(), Role::Issuer);
        assert_eq!("DEFAULT_ADMIN_ROLE".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(
            Role::Issuer.id().to_hex().parse::<Role>().unwrap(),
            Role::Issuer
        );
        assert!("minter".parse::<Role>().is_err());
    }
}
