use proptest::prelude::*;
use verivault_registry::{apply, deploy, CallOutcome, RegistryCall, RegistryState};
use verivault_types::{keccak256, Address, Role, TokenId};

// Property tests over random call sequences applied to the pure transition.

const ADMIN: Address = Address([0xD0; 20]);

fn accounts() -> impl Strategy<Value = Address> {
    prop_oneof![
        Just(ADMIN),
        Just(Address([0x11; 20])),
        Just(Address([0x22; 20])),
        Just(Address([0x33; 20])),
    ]
}

fn calls() -> impl Strategy<Value = RegistryCall> {
    prop_oneof![
        4 => (accounts(), "[a-z]{1,12}", any::<u8>()).prop_map(|(recipient, path, salt)| {
            RegistryCall::Mint {
                recipient,
                reference: format!("ipfs://{path}"),
                fingerprint: keccak256([salt]),
            }
        }),
        2 => (0u64..8).prop_map(|id| RegistryCall::Revoke { id: TokenId(id) }),
        1 => accounts().prop_map(|account| RegistryCall::GrantRole {
            role: Role::Issuer,
            account,
        }),
        1 => accounts().prop_map(|account| RegistryCall::RevokeRole {
            role: Role::Issuer,
            account,
        }),
    ]
}

fn genesis() -> RegistryState {
    deploy("VeriVault", "CERT", ADMIN).unwrap().0
}

proptest! {
    #[test]
    fn minted_ids_are_sequential_from_one(
        steps in prop::collection::vec((accounts(), calls()), 1..40),
    ) {
        let mut state = genesis();
        let mut expected = 1u64;
        for (caller, call) in steps {
            if let Ok(transition) = apply(&state, &caller, &call) {
                if let CallOutcome::Minted { id } = transition.outcome {
                    prop_assert_eq!(id, TokenId(expected));
                    expected += 1;
                }
                state = transition.state;
            }
        }
        prop_assert_eq!(state.total_minted(), expected - 1);
    }
}

proptest! {
    #[test]
    fn rejected_calls_never_change_state(
        steps in prop::collection::vec((accounts(), calls()), 1..40),
    ) {
        let mut state = genesis();
        for (caller, call) in steps {
            match apply(&state, &caller, &call) {
                Ok(transition) => {
                    prop_assert_eq!(transition.state.version, state.version + 1);
                    state = transition.state;
                }
                Err(_) => {
                    let again = apply(&state, &caller, &call);
                    prop_assert!(again.is_err());
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn revocation_is_permanent_and_records_are_immutable(
        steps in prop::collection::vec((accounts(), calls()), 1..40),
    ) {
        let mut state = genesis();
        for (caller, call) in steps {
            let before = state.clone();
            if let Ok(transition) = apply(&state, &caller, &call) {
                state = transition.state;
            }
            for old in before.records() {
                let now = state.verify(old.id).unwrap();
                prop_assert_eq!(now.owner, old.owner);
                prop_assert_eq!(&now.reference, &old.reference);
                prop_assert_eq!(now.fingerprint, old.fingerprint);
                if old.revoked {
                    prop_assert!(now.revoked);
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn only_issuers_change_certificates(
        steps in prop::collection::vec((accounts(), calls()), 1..40),
    ) {
        let mut state = genesis();
        for (caller, call) in steps {
            let was_issuer = state.has_role(Role::Issuer, &caller);
            let before = state.records().to_vec();
            if let Ok(transition) = apply(&state, &caller, &call) {
                state = transition.state;
            }
            if !was_issuer {
                prop_assert_eq!(state.records(), before.as_slice());
            }
        }
    }
}
