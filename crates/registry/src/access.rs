//! Authorization checks run before every mutating call.

use verivault_types::{Address, Role};

use crate::errors::{RegistryError, Result};
use crate::state::RegistryState;

pub fn can_mint(state: &RegistryState, caller: &Address) -> bool {
    state.has_role(Role::Issuer, caller)
}

pub fn can_revoke(state: &RegistryState, caller: &Address) -> bool {
    state.has_role(Role::Issuer, caller)
}

/// Admin is the managing role for every role, itself included.
pub fn can_manage_roles(state: &RegistryState, caller: &Address) -> bool {
    state.has_role(Role::Admin, caller)
}

pub(crate) fn ensure(allowed: bool, caller: &Address, role: Role) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(RegistryError::Unauthorized {
            account: *caller,
            role,
        })
    }
}
