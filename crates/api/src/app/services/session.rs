//! Login, per-request session validation and logout.
//!
//! A user has at most one live session: login overwrites the stored session
//! identifier, which invalidates every bearer token issued before it.

use chrono::Utc;
use serde::Serialize;

use doctrack_auth::session::session_matches;
use doctrack_auth::{JwtIssuer, JwtValidator, Principal, UserSummary, new_session_id, verify_password};
use doctrack_core::{DomainError, validate};

use super::{AppServices, ServiceResult, blocking};

/// `POST /usuarios/login` response.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub mensaje: &'static str,
    pub token: String,
    pub usuario: UserSummary,
}

const SESSION_REJECTED: &str = "Sesión inválida. Inicia sesión de nuevo.";

impl AppServices {
    /// Verify credentials and start a new session, displacing any previous one.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<LoginResponse> {
        let email = validate::normalize_email(email);
        let Some(user) = self.users.find_user_by_email(&email).await? else {
            tracing::info!("login rejected: unknown email");
            return Err(DomainError::unauthenticated("Usuario no encontrado").into());
        };

        let (plain, hash) = (password.to_string(), user.password_hash.clone());
        if !blocking(move || verify_password(&plain, &hash)).await? {
            tracing::info!(user_id = %user.id, "login rejected: wrong password");
            return Err(DomainError::unauthenticated("Contraseña incorrecta").into());
        }
        if !user.active {
            tracing::info!(user_id = %user.id, "login rejected: inactive user");
            return Err(DomainError::unauthenticated("Usuario inactivo").into());
        }

        let now = Utc::now();
        let session_id = new_session_id();
        let issued = self.jwt.issue(&user, &session_id, now)?;

        if !self.users.set_session(user.id, Some(&session_id), Some(now)).await? {
            return Err(DomainError::unauthenticated("Usuario no encontrado").into());
        }
        if user.session_token.is_some() {
            tracing::info!(user_id = %user.id, "previous session displaced by new login");
        }
        tracing::info!(user_id = %user.id, role = %user.role, "login");

        Ok(LoginResponse {
            mensaje: "Login exitoso",
            token: issued.token,
            usuario: user.to_summary(),
        })
    }

    /// Resolve a bearer token into the authenticated principal.
    ///
    /// Fails when the token is invalid or expired, the user is gone or
    /// inactive, or the token's session identifier is no longer the stored one.
    pub async fn validate_session(&self, token: &str) -> ServiceResult<Principal> {
        let claims = self.jwt.validate(token, Utc::now()).map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            DomainError::unauthenticated("Token inválido o expirado")
        })?;
        let user_id = claims
            .user_id()
            .map_err(|_| DomainError::unauthenticated("Token inválido o expirado"))?;

        let Some(user) = self.users.get_user(user_id).await? else {
            tracing::warn!(user_id = %user_id, "session rejected: user no longer exists");
            return Err(DomainError::unauthenticated(SESSION_REJECTED).into());
        };
        if !user.active {
            tracing::warn!(user_id = %user_id, "session rejected: inactive user");
            return Err(DomainError::unauthenticated(SESSION_REJECTED).into());
        }
        if !session_matches(user.session_token.as_deref(), &claims.jti) {
            tracing::info!(user_id = %user_id, "session rejected: superseded or logged out");
            return Err(DomainError::unauthenticated(SESSION_REJECTED).into());
        }

        Ok(Principal::new(user.id, user.email, user.role))
    }

    /// Clear the stored session identifier.
    pub async fn logout(&self, principal: &Principal) -> ServiceResult<()> {
        self.users.set_session(principal.id, None, None).await?;
        tracing::info!(user_id = %principal.id, "logout");
        Ok(())
    }
}
