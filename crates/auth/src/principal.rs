use serde::Serialize;

use doctrack_core::UserId;

use crate::roles::Role;

/// Identity of an authenticated request, attached by the session validator.
///
/// Only what downstream authorization needs: id, email and role as currently
/// stored (not as claimed by the token).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: UserId, email: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            email: email.into(),
            role,
        }
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }

    /// Wire form returned by `GET /usuarios/me`.
    pub fn to_view(&self) -> PrincipalView {
        PrincipalView {
            id: self.id,
            sub: self.id,
            email: self.email.clone(),
            rol: self.role,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PrincipalView {
    pub id: UserId,
    pub sub: UserId,
    pub email: String,
    pub rol: Role,
}
