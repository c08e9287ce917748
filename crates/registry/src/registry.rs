//! Certificate registry service
//!
//! Owns the current [`RegistryState`] and serializes every mutating call
//! through a single writer. Readers always observe a fully committed state:
//! either the one before a call or the one after it, never a partial one.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};
use verivault_types::{Address, Fingerprint, Role, TokenId};

use crate::errors::*;
use crate::state::RegistryState;
use crate::store::{MemoryRegistryStore, RegistryStore};
use crate::transition::{apply, apply_with_nonce, deploy, Transition};
use crate::types::*;

/// What a committed call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub outcome: CallOutcome,
    pub events: Vec<EventRecord>,
    /// State version after the call.
    pub version: u64,
}

pub struct CertificateRegistry {
    state: RwLock<Arc<RegistryState>>,
    writer: Mutex<()>,
    store: Arc<dyn RegistryStore>,
}

impl std::fmt::Debug for CertificateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("CertificateRegistry")
            .field("name", &state.name)
            .field("version", &state.version)
            .field("total_minted", &state.total_minted())
            .finish()
    }
}

impl CertificateRegistry {
    /// Resume from `store`, or deploy a fresh registry with `deployer` as
    /// Admin and Issuer when the store is empty.
    ///
    /// `name`, `symbol` and `deployer` are ignored when state already exists.
    pub fn open(
        store: Arc<dyn RegistryStore>,
        name: &str,
        symbol: &str,
        deployer: Address,
    ) -> Result<Self> {
        let state = match store.load()? {
            Some(state) => {
                info!(
                    name = %state.name,
                    version = state.version,
                    total_minted = state.total_minted(),
                    "Resumed certificate registry"
                );
                if state.name != name || state.symbol != symbol {
                    warn!(
                        stored = %state.name,
                        configured = %name,
                        "Configured registry metadata differs from stored state; keeping stored"
                    );
                }
                state
            }
            None => {
                let (state, events) = deploy(name, symbol, deployer)?;
                store.commit(&state, &events)?;
                info!(%deployer, name, symbol, "Deployed certificate registry");
                state
            }
        };

        Ok(Self {
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
            store,
        })
    }

    /// Fresh registry backed by memory only.
    pub fn in_memory(name: &str, symbol: &str, deployer: Address) -> Result<Self> {
        Self::open(Arc::new(MemoryRegistryStore::new()), name, symbol, deployer)
    }

    /// Apply `call` on behalf of `caller`.
    pub fn submit(&self, caller: &Address, call: &RegistryCall) -> Result<Committed> {
        self.commit_with(call, caller, |state| apply(state, caller, call))
    }

    /// Apply `call` only if `nonce` is the caller's next expected nonce.
    pub fn submit_with_nonce(
        &self,
        caller: &Address,
        nonce: u64,
        call: &RegistryCall,
    ) -> Result<Committed> {
        self.commit_with(call, caller, |state| {
            apply_with_nonce(state, caller, nonce, call)
        })
    }

    fn commit_with<F>(&self, call: &RegistryCall, caller: &Address, f: F) -> Result<Committed>
    where
        F: FnOnce(&RegistryState) -> Result<Transition>,
    {
        let _guard = self.writer.lock();
        let current = self.snapshot();

        let transition = match f(&current) {
            Ok(transition) => transition,
            Err(err) => {
                debug!(method = call.method(), %caller, error = %err, "Registry call rejected");
                return Err(err);
            }
        };

        self.store.commit(&transition.state, &transition.events)?;

        let version = transition.state.version;
        *self.state.write() = Arc::new(transition.state);

        info!(
            method = call.method(),
            %caller,
            version,
            events = transition.events.len(),
            "Registry call committed"
        );

        Ok(Committed {
            outcome: transition.outcome,
            events: transition.events,
            version,
        })
    }

    pub fn mint(
        &self,
        caller: &Address,
        recipient: Address,
        reference: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Result<TokenId> {
        let call = RegistryCall::Mint {
            recipient,
            reference: reference.into(),
            fingerprint,
        };
        match self.submit(caller, &call)?.outcome {
            CallOutcome::Minted { id } => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    pub fn revoke(&self, caller: &Address, id: TokenId) -> Result<()> {
        self.submit(caller, &RegistryCall::Revoke { id }).map(|_| ())
    }

    /// Returns whether membership changed.
    pub fn grant_role(&self, caller: &Address, role: Role, account: Address) -> Result<bool> {
        role_changed(self.submit(caller, &RegistryCall::GrantRole { role, account })?)
    }

    pub fn revoke_role(&self, caller: &Address, role: Role, account: Address) -> Result<bool> {
        role_changed(self.submit(caller, &RegistryCall::RevokeRole { role, account })?)
    }

    pub fn renounce_role(&self, caller: &Address, role: Role, account: Address) -> Result<bool> {
        role_changed(self.submit(caller, &RegistryCall::RenounceRole { role, account })?)
    }

    /// The latest committed state.
    pub fn snapshot(&self) -> Arc<RegistryState> {
        self.state.read().clone()
    }

    pub fn verify(&self, id: TokenId) -> Result<CertificateView> {
        self.snapshot().verify(id)
    }

    pub fn owner_of(&self, id: TokenId) -> Result<Address> {
        self.snapshot().owner_of(id)
    }

    pub fn token_uri(&self, id: TokenId) -> Result<String> {
        self.snapshot().token_uri(id)
    }

    pub fn is_revoked(&self, id: TokenId) -> Result<bool> {
        self.snapshot().is_revoked(id)
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.snapshot().has_role(role, account)
    }

    pub fn total_minted(&self) -> u64 {
        self.snapshot().total_minted()
    }

    pub fn certificates_of(&self, owner: &Address) -> Vec<TokenId> {
        self.snapshot().certificates_of(owner)
    }

    pub fn nonce_of(&self, account: &Address) -> u64 {
        self.snapshot().nonce_of(account)
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }

    pub fn events_since(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>> {
        Ok(self.store.events_since(from, limit)?)
    }

    pub fn flush(&self) -> Result<()> {
        Ok(self.store.flush()?)
    }
}

fn role_changed(committed: Committed) -> Result<bool> {
    match committed.outcome {
        CallOutcome::RoleUpdated { changed, .. } => Ok(changed),
        other => Err(unexpected(other)),
    }
}

fn unexpected(outcome: CallOutcome) -> RegistryError {
    RegistryError::UnexpectedOutcome {
        outcome: format!("{outcome:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verivault_types::keccak256;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[test]
    fn wrappers_drive_full_lifecycle() {
        let deployer = addr(0xD0);
        let registry = CertificateRegistry::in_memory("VeriVault", "CERT", deployer).unwrap();

        let id = registry
            .mint(&deployer, addr(0xAA), "ipfs://bafy", keccak256(b"diploma"))
            .unwrap();
        assert_eq!(id, TokenId(1));
        assert_eq!(registry.owner_of(id).unwrap(), addr(0xAA));
        assert_eq!(registry.token_uri(id).unwrap(), "ipfs://bafy");
        assert!(!registry.is_revoked(id).unwrap());

        registry.revoke(&deployer, id).unwrap();
        assert!(registry.verify(id).unwrap().revoked);
        assert_eq!(registry.version(), 2);
    }

    #[test]
    fn outcome_mismatch_is_an_internal_error_not_storage() {
        let err = role_changed(Committed {
            outcome: CallOutcome::Revoked { id: TokenId(1) },
            events: Vec::new(),
            version: 1,
        })
        .unwrap_err();
        assert!(matches!(err, RegistryError::UnexpectedOutcome { .. }));
        assert_eq!(err.code(), "unexpected_outcome");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn snapshots_are_stable_across_later_commits() {
        let deployer = addr(0xD0);
        let registry = CertificateRegistry::in_memory("VeriVault", "CERT", deployer).unwrap();
        let before = registry.snapshot();

        registry
            .mint(&deployer, addr(0xAA), "ipfs://bafy", keccak256(b"x"))
            .unwrap();

        assert_eq!(before.total_minted(), 0);
        assert_eq!(registry.total_minted(), 1);
    }

    #[test]
    fn event_log_accumulates_in_order() {
        let deployer = addr(0xD0);
        let registry = CertificateRegistry::in_memory("VeriVault", "CERT", deployer).unwrap();
        registry
            .grant_role(&deployer, Role::Issuer, addr(0x11))
            .unwrap();
        registry
            .mint(&addr(0x11), addr(0xAA), "ipfs://a", keccak256(b"a"))
            .unwrap();

        let events = registry.events_since(0, 100).unwrap();
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
        assert!(matches!(
            events[3].event,
            RegistryEvent::Minted { issuer, .. } if issuer == addr(0x11)
        ));
    }

    #[test]
    fn rejected_submission_does_not_advance_version() {
        let deployer = addr(0xD0);
        let registry = CertificateRegistry::in_memory("VeriVault", "CERT", deployer).unwrap();
        let err = registry
            .mint(&addr(0x01), addr(0xAA), "ipfs://a", keccak256(b"a"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(registry.version(), 0);
        assert_eq!(registry.events_since(0, 100).unwrap().len(), 2);
    }
}
