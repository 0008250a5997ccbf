//! Resource scoping for contracts.
//!
//! Principals with the lowest-privilege role only see and touch contracts whose
//! owning client is owned by themselves. Higher roles are unrestricted.

use doctrack_core::UserId;

use crate::authorize::AuthzError;
use crate::principal::Principal;

/// Which contracts a principal may reach.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContractScope {
    Unrestricted,
    /// Only contracts whose client's owning user is this id.
    OwnedBy(UserId),
}

impl ContractScope {
    pub fn for_principal(principal: &Principal) -> Self {
        if principal.is_client() {
            ContractScope::OwnedBy(principal.id)
        } else {
            ContractScope::Unrestricted
        }
    }

    /// Owner restriction to push into a query, if any.
    pub fn owner_filter(&self) -> Option<UserId> {
        match self {
            ContractScope::Unrestricted => None,
            ContractScope::OwnedBy(id) => Some(*id),
        }
    }

    /// Whether a contract whose client is owned by `client_owner` is reachable.
    pub fn permits(&self, client_owner: Option<UserId>) -> bool {
        match self {
            ContractScope::Unrestricted => true,
            ContractScope::OwnedBy(id) => client_owner == Some(*id),
        }
    }

    pub fn ensure_permits(&self, client_owner: Option<UserId>, message: &str) -> Result<(), AuthzError> {
        if self.permits(client_owner) {
            Ok(())
        } else {
            Err(AuthzError::OutOfScope(message.to_string()))
        }
    }

    /// Moving a contract to a different client is reserved to unrestricted
    /// principals.
    pub fn ensure_may_reassign(&self) -> Result<(), AuthzError> {
        match self {
            ContractScope::Unrestricted => Ok(()),
            ContractScope::OwnedBy(_) => Err(AuthzError::OutOfScope(
                "No puedes reasignar el contrato a otro cliente.".to_string(),
            )),
        }
    }
}
