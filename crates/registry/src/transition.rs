//! Pure state transitions.
//!
//! `apply(state, caller, call)` either returns the complete next state with
//! the events it emitted, or an error. The input state is never modified, so
//! a rejected call has no effect by construction and a sequence of calls can
//! be replayed deterministically from any earlier state.

use verivault_types::{Address, Fingerprint, Role, TokenId};

use crate::access::{can_manage_roles, can_mint, can_revoke, ensure};
use crate::errors::{RegistryError, Result, ValidationError};
use crate::state::RegistryState;
use crate::types::{
    CallOutcome, CertificateRecord, EventRecord, RegistryCall, RegistryEvent, MAX_REFERENCE_LEN,
};

/// Result of an accepted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: RegistryState,
    pub outcome: CallOutcome,
    pub events: Vec<EventRecord>,
}

/// Build the initial state: the deployer holds both Admin and Issuer.
pub fn deploy(
    name: impl Into<String>,
    symbol: impl Into<String>,
    deployer: Address,
) -> Result<(RegistryState, Vec<EventRecord>)> {
    let name = name.into();
    let symbol = symbol.into();
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyMetadata { field: "name" }.into());
    }
    if symbol.trim().is_empty() {
        return Err(ValidationError::EmptyMetadata { field: "symbol" }.into());
    }
    if deployer.is_zero() {
        return Err(ValidationError::ZeroAccount.into());
    }

    let mut state = RegistryState::empty(name, symbol);
    let mut events = Vec::with_capacity(Role::ALL.len());
    for role in Role::ALL {
        state.roles.grant(role, deployer);
        events.push(RegistryEvent::RoleGranted {
            role,
            account: deployer,
            sender: deployer,
        });
    }
    let records = stamp(&mut state, events);
    Ok((state, records))
}

/// Apply one call on behalf of `caller`.
pub fn apply(state: &RegistryState, caller: &Address, call: &RegistryCall) -> Result<Transition> {
    match call {
        RegistryCall::Mint {
            recipient,
            reference,
            fingerprint,
        } => mint(state, caller, recipient, reference, fingerprint),
        RegistryCall::Revoke { id } => revoke(state, caller, *id),
        RegistryCall::GrantRole { role, account } => grant_role(state, caller, *role, account),
        RegistryCall::RevokeRole { role, account } => revoke_role(state, caller, *role, account),
        RegistryCall::RenounceRole { role, account } => {
            renounce_role(state, caller, *role, account)
        }
    }
}

/// Like [`apply`], but first requires `nonce` to equal the caller's next
/// expected nonce and advances it on success.
pub fn apply_with_nonce(
    state: &RegistryState,
    caller: &Address,
    nonce: u64,
    call: &RegistryCall,
) -> Result<Transition> {
    let expected = state.nonce_of(caller);
    if nonce != expected {
        return Err(RegistryError::InvalidNonce {
            account: *caller,
            expected,
            actual: nonce,
        });
    }
    let mut transition = apply(state, caller, call)?;
    transition.state.nonces.insert(*caller, expected + 1);
    Ok(transition)
}

/// Input checks for `mint`.
///
/// Recipient must be non-zero, reference non-blank and at most
/// [`MAX_REFERENCE_LEN`] bytes, fingerprint not all zeros. The fingerprint
/// length itself is fixed by its type.
pub fn validate_mint(
    recipient: &Address,
    reference: &str,
    fingerprint: &Fingerprint,
) -> std::result::Result<(), ValidationError> {
    if recipient.is_zero() {
        return Err(ValidationError::ZeroRecipient);
    }
    if reference.trim().is_empty() {
        return Err(ValidationError::EmptyReference);
    }
    if reference.len() > MAX_REFERENCE_LEN {
        return Err(ValidationError::ReferenceTooLong {
            len: reference.len(),
            max: MAX_REFERENCE_LEN,
        });
    }
    if fingerprint.is_zero() {
        return Err(ValidationError::ZeroFingerprint);
    }
    Ok(())
}

fn mint(
    state: &RegistryState,
    caller: &Address,
    recipient: &Address,
    reference: &str,
    fingerprint: &Fingerprint,
) -> Result<Transition> {
    ensure(can_mint(state, caller), caller, Role::Issuer)?;
    validate_mint(recipient, reference, fingerprint)?;

    let id = TokenId(state.next_id);
    let next_id = state
        .next_id
        .checked_add(1)
        .ok_or(RegistryError::IdsDepleted)?;

    let mut next = state.clone();
    next.records.push(CertificateRecord {
        id,
        owner: *recipient,
        reference: reference.to_string(),
        fingerprint: *fingerprint,
        revoked: false,
    });
    next.next_id = next_id;

    let event = RegistryEvent::Minted {
        id,
        recipient: *recipient,
        issuer: *caller,
        reference: reference.to_string(),
        fingerprint: *fingerprint,
    };
    Ok(finish(next, CallOutcome::Minted { id }, vec![event]))
}

fn revoke(state: &RegistryState, caller: &Address, id: TokenId) -> Result<Transition> {
    ensure(can_revoke(state, caller), caller, Role::Issuer)?;
    let record = state.record(id).ok_or(RegistryError::NotFound { id })?;
    if record.revoked {
        return Err(RegistryError::AlreadyRevoked { id });
    }

    let mut next = state.clone();
    if let Some(record) = next.record_mut(id) {
        record.revoked = true;
    }

    let event = RegistryEvent::Revoked {
        id,
        issuer: *caller,
    };
    Ok(finish(next, CallOutcome::Revoked { id }, vec![event]))
}

fn grant_role(
    state: &RegistryState,
    caller: &Address,
    role: Role,
    account: &Address,
) -> Result<Transition> {
    ensure(can_manage_roles(state, caller), caller, Role::Admin)?;
    if account.is_zero() {
        return Err(ValidationError::ZeroAccount.into());
    }

    let mut next = state.clone();
    let changed = next.roles.grant(role, *account);
    let events = if changed {
        vec![RegistryEvent::RoleGranted {
            role,
            account: *account,
            sender: *caller,
        }]
    } else {
        Vec::new()
    };
    let outcome = CallOutcome::RoleUpdated {
        role,
        account: *account,
        granted: true,
        changed,
    };
    Ok(finish(next, outcome, events))
}

fn revoke_role(
    state: &RegistryState,
    caller: &Address,
    role: Role,
    account: &Address,
) -> Result<Transition> {
    ensure(can_manage_roles(state, caller), caller, Role::Admin)?;
    Ok(remove_role(state, caller, role, account))
}

fn renounce_role(
    state: &RegistryState,
    caller: &Address,
    role: Role,
    account: &Address,
) -> Result<Transition> {
    if caller != account {
        return Err(RegistryError::RenounceForbidden {
            caller: *caller,
            account: *account,
            role,
        });
    }
    Ok(remove_role(state, caller, role, account))
}

fn remove_role(
    state: &RegistryState,
    caller: &Address,
    role: Role,
    account: &Address,
) -> Transition {
    let mut next = state.clone();
    let changed = next.roles.revoke(role, account);
    let events = if changed {
        vec![RegistryEvent::RoleRevoked {
            role,
            account: *account,
            sender: *caller,
        }]
    } else {
        Vec::new()
    };
    let outcome = CallOutcome::RoleUpdated {
        role,
        account: *account,
        granted: false,
        changed,
    };
    finish(next, outcome, events)
}

fn finish(mut next: RegistryState, outcome: CallOutcome, events: Vec<RegistryEvent>) -> Transition {
    next.version += 1;
    let events = stamp(&mut next, events);
    Transition {
        state: next,
        outcome,
        events,
    }
}

/// Assign log positions to `events` at the state's current version.
fn stamp(state: &mut RegistryState, events: Vec<RegistryEvent>) -> Vec<EventRecord> {
    events
        .into_iter()
        .map(|event| {
            let record = EventRecord {
                seq: state.event_count,
                version: state.version,
                event,
            };
            state.event_count += 1;
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use verivault_types::keccak256;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    fn genesis() -> RegistryState {
        deploy("VeriVault", "CERT", addr(0xD0)).unwrap().0
    }

    fn mint_call(recipient: Address, reference: &str, data: &[u8]) -> RegistryCall {
        RegistryCall::Mint {
            recipient,
            reference: reference.to_string(),
            fingerprint: keccak256(data),
        }
    }

    #[test]
    fn deploy_grants_both_roles_to_deployer() {
        let (state, events) = deploy("VeriVault", "CERT", addr(0xD0)).unwrap();
        assert!(state.has_role(Role::Admin, &addr(0xD0)));
        assert!(state.has_role(Role::Issuer, &addr(0xD0)));
        assert!(!state.has_role(Role::Issuer, &addr(0x01)));
        assert_eq!(state.version, 0);
        assert_eq!(state.next_id, 1);
        assert_eq!(events.len(), 2);
        assert_eq!(state.event_count, 2);
    }

    #[test]
    fn deploy_rejects_blank_metadata_and_zero_deployer() {
        assert!(deploy(" ", "CERT", addr(1)).is_err());
        assert!(deploy("VeriVault", "", addr(1)).is_err());
        assert!(matches!(
            deploy("VeriVault", "CERT", Address::ZERO),
            Err(RegistryError::Validation(ValidationError::ZeroAccount))
        ));
    }

    #[test]
    fn mint_allocates_sequential_ids_and_emits_event() {
        let state = genesis();
        let issuer = addr(0xD0);

        let first = apply(&state, &issuer, &mint_call(addr(0xAA), "ipfs://bafy1", b"file1")).unwrap();
        assert_eq!(first.outcome, CallOutcome::Minted { id: TokenId(1) });
        assert_eq!(first.state.next_id, 2);
        assert_eq!(first.state.version, 1);
        assert_eq!(first.events.len(), 1);
        assert_eq!(first.events[0].seq, 2);
        assert_eq!(
            first.events[0].event,
            RegistryEvent::Minted {
                id: TokenId(1),
                recipient: addr(0xAA),
                issuer,
                reference: "ipfs://bafy1".into(),
                fingerprint: keccak256(b"file1"),
            }
        );

        let second =
            apply(&first.state, &issuer, &mint_call(addr(0xBB), "ipfs://bafy2", b"file2")).unwrap();
        assert_eq!(second.outcome, CallOutcome::Minted { id: TokenId(2) });
        assert_eq!(
            second.state.verify(TokenId(1)).unwrap(),
            first.state.verify(TokenId(1)).unwrap()
        );
    }

    #[test]
    fn rejected_calls_leave_input_state_untouched() {
        let state = genesis();
        let before = state.clone();

        let err = apply(&state, &addr(0x66), &mint_call(addr(0xAA), "ipfs://x", b"x")).unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized { role: Role::Issuer, .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn mint_validation_policy() {
        let state = genesis();
        let issuer = addr(0xD0);
        let cases = [
            (
                mint_call(Address::ZERO, "ipfs://x", b"x"),
                ValidationError::ZeroRecipient,
            ),
            (mint_call(addr(1), "   ", b"x"), ValidationError::EmptyReference),
            (
                RegistryCall::Mint {
                    recipient: addr(1),
                    reference: "ipfs://x".into(),
                    fingerprint: Fingerprint::ZERO,
                },
                ValidationError::ZeroFingerprint,
            ),
            (
                mint_call(addr(1), &"a".repeat(MAX_REFERENCE_LEN + 1), b"x"),
                ValidationError::ReferenceTooLong {
                    len: MAX_REFERENCE_LEN + 1,
                    max: MAX_REFERENCE_LEN,
                },
            ),
        ];
        for (call, expected) in cases {
            match apply(&state, &issuer, &call) {
                Err(RegistryError::Validation(actual)) => assert_eq!(actual, expected),
                other => panic!("expected validation failure, got {other:?}"),
            }
        }

        let longest = mint_call(addr(1), &"a".repeat(MAX_REFERENCE_LEN), b"x");
        let accepted = apply(&state, &issuer, &longest).unwrap();
        assert_eq!(accepted.outcome, CallOutcome::Minted { id: TokenId(1) });
        assert_eq!(
            accepted.state.token_uri(TokenId(1)).unwrap().len(),
            MAX_REFERENCE_LEN
        );
    }

    #[test]
    fn revoke_is_one_way_and_guarded() {
        let issuer = addr(0xD0);
        let minted = apply(&genesis(), &issuer, &mint_call(addr(0xAA), "ipfs://a", b"a")).unwrap();

        let revoked = apply(&minted.state, &issuer, &RegistryCall::Revoke { id: TokenId(1) }).unwrap();
        assert!(revoked.state.is_revoked(TokenId(1)).unwrap());
        assert_eq!(
            revoked.events[0].event,
            RegistryEvent::Revoked {
                id: TokenId(1),
                issuer
            }
        );

        let again = apply(&revoked.state, &issuer, &RegistryCall::Revoke { id: TokenId(1) });
        assert!(matches!(again, Err(RegistryError::AlreadyRevoked { id }) if id == TokenId(1)));

        let missing = apply(&revoked.state, &issuer, &RegistryCall::Revoke { id: TokenId(9) });
        assert!(matches!(missing, Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn role_grants_are_admin_only_and_idempotent() {
        let admin = addr(0xD0);
        let state = genesis();
        let grant = RegistryCall::GrantRole {
            role: Role::Issuer,
            account: addr(0x10),
        };

        assert!(matches!(
            apply(&state, &addr(0x10), &grant),
            Err(RegistryError::Unauthorized { role: Role::Admin, .. })
        ));

        let granted = apply(&state, &admin, &grant).unwrap();
        assert!(granted.state.has_role(Role::Issuer, &addr(0x10)));
        assert_eq!(granted.events.len(), 1);

        let repeat = apply(&granted.state, &admin, &grant).unwrap();
        assert!(repeat.events.is_empty());
        assert!(matches!(
            repeat.outcome,
            CallOutcome::RoleUpdated { changed: false, .. }
        ));
    }

    #[test]
    fn renounce_only_for_self() {
        let state = genesis();
        let call = RegistryCall::RenounceRole {
            role: Role::Issuer,
            account: addr(0xD0),
        };
        assert!(matches!(
            apply(&state, &addr(0x01), &call),
            Err(RegistryError::RenounceForbidden { .. })
        ));
        let renounced = apply(&state, &addr(0xD0), &call).unwrap();
        assert!(!renounced.state.has_role(Role::Issuer, &addr(0xD0)));
        assert!(renounced.state.has_role(Role::Admin, &addr(0xD0)));
    }

    #[test]
    fn nonce_must_match_and_advances_only_on_success() {
        let issuer = addr(0xD0);
        let state = genesis();
        let call = mint_call(addr(0xAA), "ipfs://a", b"a");

        assert!(matches!(
            apply_with_nonce(&state, &issuer, 1, &call),
            Err(RegistryError::InvalidNonce {
                expected: 0,
                actual: 1,
                ..
            })
        ));

        let accepted = apply_with_nonce(&state, &issuer, 0, &call).unwrap();
        assert_eq!(accepted.state.nonce_of(&issuer), 1);

        let bad = mint_call(Address::ZERO, "ipfs://a", b"a");
        assert!(apply_with_nonce(&accepted.state, &issuer, 1, &bad).is_err());
        assert_eq!(accepted.state.nonce_of(&issuer), 1);
    }

    #[test]
    fn replay_is_deterministic() {
        let issuer = addr(0xD0);
        let calls = vec![
            mint_call(addr(1), "ipfs://1", b"1"),
            mint_call(addr(2), "ipfs://2", b"2"),
            RegistryCall::Revoke { id: TokenId(1) },
        ];
        let run = || {
            calls.iter().fold(genesis(), |state, call| {
                apply(&state, &issuer, call).unwrap().state
            })
        };
        assert_eq!(run(), run());
    }
}
