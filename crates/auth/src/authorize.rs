use thiserror::Error;

use crate::roles::{Role, normalize_role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' is not permitted for this operation")]
    RoleNotPermitted { role: String },

    #[error("forbidden: {0}")]
    OutOfScope(String),
}

/// Decide whether a principal holding `role` may run an operation that
/// declares `required` as its acceptable roles.
///
/// - No IO
/// - No panics
/// - No caching: call it on every request
///
/// An empty `required` set means the operation is unrestricted. Otherwise the
/// principal's role, trimmed and lower-cased, must equal one of the declared
/// roles.
pub fn authorize(role: &str, required: &[Role]) -> Result<(), AuthzError> {
    if required.is_empty() {
        return Ok(());
    }

    let normalized = normalize_role(role);
    if required.iter().any(|r| normalize_role(r.as_str()) == normalized) {
        Ok(())
    } else {
        Err(AuthzError::RoleNotPermitted {
            role: role.trim().to_string(),
        })
    }
}
