//! User accounts: entity, request shapes and public projections.
//!
//! The entity carries internal fields (password hash, session identifier) that
//! must never leave the service; every outward representation goes through
//! [`PublicUser`] or [`UserSummary`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use doctrack_core::{DomainResult, Entity, UserId, nullable, validate};

use crate::Role;

/// A user account.
///
/// # Invariants
/// - `email` is unique across all users (enforced by the store).
/// - `session_token` holds at most one live session; login overwrites it and
///   logout clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub photo_url: Option<String>,
    pub session_token: Option<String>,
    pub active: bool,
    pub last_access: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

impl User {
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            nombre_completo: self.full_name.clone(),
            email: self.email.clone(),
            telefono: self.phone.clone(),
            rol: self.role,
            foto_url: self.photo_url.clone(),
            activo: self.active,
            ultimo_acceso: self.last_access,
            creado_en: self.created_at,
            actualizado_en: self.updated_at,
        }
    }

    pub fn to_summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            nombre_completo: self.full_name.clone(),
            email: self.email.clone(),
            rol: self.role,
            foto_url: self.photo_url.clone(),
        }
    }

    /// Apply validated changes. `password_hash` is the already-hashed
    /// replacement when the change set carried a new password.
    pub fn apply(&mut self, changes: UserChanges, password_hash: Option<String>, now: DateTime<Utc>) {
        if let Some(v) = changes.full_name {
            self.full_name = v;
        }
        if let Some(v) = changes.email {
            self.email = v;
        }
        if let Some(v) = changes.phone {
            self.phone = v;
        }
        if let Some(v) = password_hash {
            self.password_hash = v;
        }
        if let Some(v) = changes.role {
            self.role = v;
        }
        if let Some(v) = changes.photo_url {
            self.photo_url = v;
        }
        if let Some(v) = changes.active {
            self.active = v;
        }
        self.updated_at = now;
    }

    #[cfg(test)]
    pub(crate) fn fixture(id: UserId, email: &str, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id,
            full_name: "Test User".to_string(),
            email: email.to_string(),
            phone: None,
            password_hash: String::new(),
            role,
            photo_url: None,
            session_token: None,
            active: true,
            last_access: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Public-safe projection (no password hash, no session token).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub id: UserId,
    pub nombre_completo: String,
    pub email: String,
    pub telefono: Option<String>,
    pub rol: Role,
    pub foto_url: Option<String>,
    pub activo: bool,
    pub ultimo_acceso: Option<DateTime<Utc>>,
    pub creado_en: DateTime<Utc>,
    pub actualizado_en: DateTime<Utc>,
}

/// Compact projection used in login responses and embedded in client views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub nombre_completo: String,
    pub email: String,
    pub rol: Role,
    pub foto_url: Option<String>,
}

/// Insertable user record (password already hashed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub photo_url: Option<String>,
    pub active: bool,
}

/// `POST /usuarios` body.
///
/// `password` is plaintext; `password_hash` is accepted as an alias for
/// compatibility with older clients and is hashed all the same.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUser {
    pub nombre_completo: String,
    pub email: String,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(alias = "password_hash")]
    pub password: String,
    pub rol: String,
    #[serde(default)]
    pub foto_url: Option<String>,
    #[serde(default)]
    pub activo: Option<bool>,
}

pub const MIN_PASSWORD_LEN: usize = 6;

impl CreateUser {
    /// Validate and normalize. Returns the record to insert (with the
    /// plaintext still in `password_hash`) so the caller can hash it.
    pub fn validate(self) -> DomainResult<(NewUser, String)> {
        let full_name = validate::non_blank("nombre_completo", &self.nombre_completo)?;
        validate::char_len("nombre_completo", &full_name, 3, 100)?;
        let email = validate::email("email", &self.email)?;
        validate::char_len("password", &self.password, MIN_PASSWORD_LEN, 1024)?;
        let role: Role = self.rol.parse()?;
        let photo_url = self
            .foto_url
            .as_deref()
            .map(|u| validate::url("foto_url", u))
            .transpose()?;
        let phone = self.telefono.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());

        let new_user = NewUser {
            full_name,
            email,
            phone,
            password_hash: String::new(),
            role,
            photo_url,
            active: self.activo.unwrap_or(true),
        };
        Ok((new_user, self.password))
    }
}

/// `PUT /usuarios/:id` body. Every field optional; the session token is not
/// writable here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUser {
    #[serde(default)]
    pub nombre_completo: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub telefono: Option<Option<String>>,
    #[serde(default, alias = "password_hash")]
    pub password: Option<String>,
    #[serde(default)]
    pub rol: Option<String>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub foto_url: Option<Option<String>>,
    #[serde(default)]
    pub activo: Option<bool>,
}

/// Validated, normalized form of [`UpdateUser`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub photo_url: Option<Option<String>>,
    pub active: Option<bool>,
}

impl UpdateUser {
    pub fn validate(self) -> DomainResult<UserChanges> {
        let full_name = self
            .nombre_completo
            .map(|n| -> DomainResult<String> {
                let n = validate::non_blank("nombre_completo", &n)?;
                validate::char_len("nombre_completo", &n, 3, 100)?;
                Ok(n)
            })
            .transpose()?;
        let email = self.email.map(|e| validate::email("email", &e)).transpose()?;
        if let Some(p) = &self.password {
            validate::char_len("password", p, MIN_PASSWORD_LEN, 1024)?;
        }
        let role = self.rol.map(|r| r.parse::<Role>()).transpose()?;
        let photo_url = match self.foto_url {
            Some(Some(u)) => Some(Some(validate::url("foto_url", &u)?)),
            other => other,
        };
        let phone = self
            .telefono
            .map(|p| p.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()));

        Ok(UserChanges {
            full_name,
            email,
            phone,
            password: self.password,
            role,
            photo_url,
            active: self.activo,
        })
    }
}
