//! User administration.

use chrono::Utc;
use serde::Serialize;

use doctrack_auth::{CreateUser, PublicUser, Role, UpdateUser, UserSummary, hash_password};
use doctrack_core::{DomainError, UserId};
use doctrack_infra::StoreError;

use super::{AppServices, ServiceError, ServiceResult, blocking};

const EMAIL_EXISTS: &str = "Ya existe un usuario con ese email";
const EMAIL_IN_USE: &str = "El email ya está en uso por otro usuario";
/// Result cap of the preparer/administrator search.
pub const SEARCH_LIMIT: u32 = 10;

/// `DELETE /usuarios/:id` response.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteUserResponse {
    pub ok: bool,
    #[serde(rename = "deletedId")]
    pub deleted_id: UserId,
}

fn not_found(id: UserId) -> ServiceError {
    DomainError::not_found(format!("Usuario con ID {id} no encontrado")).into()
}

fn unique_as(msg: &'static str) -> impl FnOnce(StoreError) -> ServiceError {
    move |e| match e {
        StoreError::Unique(_) => DomainError::conflict(msg).into(),
        other => other.into(),
    }
}

impl AppServices {
    pub async fn list_users(&self) -> ServiceResult<Vec<PublicUser>> {
        Ok(self.users.list_users().await?.iter().map(|u| u.to_public()).collect())
    }

    pub async fn get_user(&self, id: UserId) -> ServiceResult<PublicUser> {
        match self.users.get_user(id).await? {
            Some(u) => Ok(u.to_public()),
            None => Err(not_found(id)),
        }
    }

    pub async fn create_user(&self, body: CreateUser) -> ServiceResult<PublicUser> {
        let (mut new_user, password) = body.validate()?;
        if self.users.find_user_by_email(&new_user.email).await?.is_some() {
            return Err(DomainError::conflict(EMAIL_EXISTS).into());
        }
        new_user.password_hash = blocking(move || hash_password(&password)).await?;

        let user = self
            .users
            .insert_user(new_user, Utc::now())
            .await
            .map_err(unique_as(EMAIL_EXISTS))?;
        tracing::info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user.to_public())
    }

    /// Partial update. A rejected change leaves the stored user untouched.
    pub async fn update_user(&self, id: UserId, body: UpdateUser) -> ServiceResult<PublicUser> {
        let mut changes = body.validate()?;
        let mut user = self.users.get_user(id).await?.ok_or_else(|| not_found(id))?;

        if let Some(email) = &changes.email {
            if *email != user.email {
                if let Some(other) = self.users.find_user_by_email(email).await? {
                    if other.id != id {
                        return Err(DomainError::conflict(EMAIL_IN_USE).into());
                    }
                }
            }
        }

        let password_hash = match changes.password.take() {
            Some(p) => Some(blocking(move || hash_password(&p)).await?),
            None => None,
        };
        user.apply(changes, password_hash, Utc::now());
        self.users.save_user(&user).await.map_err(unique_as(EMAIL_IN_USE))?;
        Ok(user.to_public())
    }

    pub async fn delete_user(&self, id: UserId) -> ServiceResult<DeleteUserResponse> {
        let deleted = self.users.delete_user(id).await.map_err(|e| match e {
            StoreError::ForeignKey(_) => ServiceError::from(DomainError::conflict(
                "No se puede eliminar el usuario: tiene clientes asociados",
            )),
            other => other.into(),
        })?;
        if !deleted {
            return Err(not_found(id));
        }
        tracing::info!(user_id = %id, "user deleted");
        Ok(DeleteUserResponse {
            ok: true,
            deleted_id: id,
        })
    }

    /// Preparers or administrators matching `text` on name or email, for
    /// assignment pickers. `role` defaults to preparer.
    pub async fn search_users(&self, role: Option<&str>, text: Option<&str>) -> ServiceResult<Vec<UserSummary>> {
        let role = match role.map(str::trim).filter(|r| !r.is_empty()) {
            None => Role::Preparer,
            Some(raw) => raw.parse::<Role>()?,
        };
        if role == Role::Client {
            return Err(DomainError::validation("rol debe ser preparador o administrador").into());
        }
        let text = text.map(str::trim).filter(|t| !t.is_empty());
        let users = self.users.search_users(role, text, SEARCH_LIMIT).await?;
        Ok(users.iter().map(|u| u.to_summary()).collect())
    }
}
