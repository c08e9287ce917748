//! Explicit, versioned registry state.
//!
//! `RegistryState` is a plain value. Reads are methods on it; writes only
//! happen through [`crate::transition::apply`], which produces a new value.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use verivault_types::{Address, Role, TokenId};

use crate::errors::{RegistryError, Result};
use crate::types::{CertificateRecord, CertificateView};

/// Role membership as a plain mapping from role to holders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTable {
    members: BTreeMap<Role, BTreeSet<Address>>,
}

impl RoleTable {
    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.members
            .get(&role)
            .map(|holders| holders.contains(account))
            .unwrap_or(false)
    }

    /// Returns true if the account did not already hold the role.
    pub(crate) fn grant(&mut self, role: Role, account: Address) -> bool {
        self.members.entry(role).or_default().insert(account)
    }

    /// Returns true if the account held the role.
    pub(crate) fn revoke(&mut self, role: Role, account: &Address) -> bool {
        self.members
            .get_mut(&role)
            .map(|holders| holders.remove(account))
            .unwrap_or(false)
    }

    pub fn holders(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    pub name: String,
    pub symbol: String,
    /// Incremented once per accepted mutating call.
    pub version: u64,
    /// Id the next successful mint will receive. Starts at 1.
    pub next_id: u64,
    /// Records in id order; the record for id `n` lives at index `n - 1`.
    pub(crate) records: Vec<CertificateRecord>,
    pub(crate) roles: RoleTable,
    /// Next expected envelope nonce per account.
    #[serde(default)]
    pub(crate) nonces: BTreeMap<Address, u64>,
    /// Number of events committed so far; the next event's sequence number.
    #[serde(default)]
    pub event_count: u64,
}

impl RegistryState {
    /// An empty registry with no roles assigned. Use
    /// [`crate::transition::deploy`] to obtain a bootstrapped state.
    pub(crate) fn empty(name: String, symbol: String) -> Self {
        Self {
            name,
            symbol,
            version: 0,
            next_id: 1,
            records: Vec::new(),
            roles: RoleTable::default(),
            nonces: BTreeMap::new(),
            event_count: 0,
        }
    }

    pub fn record(&self, id: TokenId) -> Option<&CertificateRecord> {
        if id.0 == 0 || id.0 >= self.next_id {
            return None;
        }
        let index = usize::try_from(id.0 - 1).ok()?;
        self.records.get(index)
    }

    pub(crate) fn record_mut(&mut self, id: TokenId) -> Option<&mut CertificateRecord> {
        if id.0 == 0 || id.0 >= self.next_id {
            return None;
        }
        let index = usize::try_from(id.0 - 1).ok()?;
        self.records.get_mut(index)
    }

    fn require(&self, id: TokenId) -> Result<&CertificateRecord> {
        self.record(id).ok_or(RegistryError::NotFound { id })
    }

    pub fn verify(&self, id: TokenId) -> Result<CertificateView> {
        self.require(id).map(CertificateView::from)
    }

    pub fn owner_of(&self, id: TokenId) -> Result<Address> {
        self.require(id).map(|record| record.owner)
    }

    pub fn token_uri(&self, id: TokenId) -> Result<String> {
        self.require(id).map(|record| record.reference.clone())
    }

    pub fn is_revoked(&self, id: TokenId) -> Result<bool> {
        self.require(id).map(|record| record.revoked)
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.roles.has_role(role, account)
    }

    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    pub fn total_minted(&self) -> u64 {
        self.next_id - 1
    }

    /// Ids owned by `owner`, ascending.
    pub fn certificates_of(&self, owner: &Address) -> Vec<TokenId> {
        self.records
            .iter()
            .filter(|record| record.owner == *owner)
            .map(|record| record.id)
            .collect()
    }

    pub fn records(&self) -> &[CertificateRecord] {
        &self.records
    }

    pub fn nonce_of(&self, account: &Address) -> u64 {
        self.nonces.get(account).copied().unwrap_or(0)
    }
}
