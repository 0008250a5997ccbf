use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use doctrack_core::UserId;

/// Bearer-token payload (transport-agnostic).
///
/// `sub` is the user id rendered as a string (JWT `StringOrURI`); `jti` is the
/// per-login session identifier that must match the one stored on the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub rol: String,
    pub jti: String,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Absolute expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> Result<UserId, TokenValidationError> {
        self.sub
            .parse::<UserId>()
            .map_err(|_| TokenValidationError::InvalidSubject)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("token subject is not a user id")]
    InvalidSubject,

    #[error("token carries no session identifier")]
    MissingSessionId,
}

/// Deterministically validate session claims against `now`.
///
/// Note: this validates the *claims* only. Signature verification happens in
/// [`crate::token`].
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    if claims.jti.trim().is_empty() {
        return Err(TokenValidationError::MissingSessionId);
    }
    claims.user_id()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_at(now: DateTime<Utc>) -> SessionClaims {
        SessionClaims {
            sub: "7".to_string(),
            email: "a@x.com".to_string(),
            rol: "cliente".to_string(),
            jti: "ab".repeat(32),
            iat: now.timestamp(),
            exp: (now + Duration::days(1)).timestamp(),
        }
    }

    #[test]
    fn accepts_claims_inside_window() {
        let now = Utc::now();
        let claims = claims_at(now);
        assert_eq!(validate_claims(&claims, now + Duration::hours(23)), Ok(()));
        assert_eq!(claims.user_id().unwrap(), UserId::new(7));
    }

    #[test]
    fn rejects_expired_and_future_claims() {
        let now = Utc::now();
        let claims = claims_at(now);
        assert_eq!(
            validate_claims(&claims, now + Duration::days(1)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, now - Duration::minutes(1)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn rejects_inverted_window_and_bad_subject() {
        let now = Utc::now();
        let mut claims = claims_at(now);
        claims.exp = claims.iat;
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::InvalidTimeWindow));

        let mut claims = claims_at(now);
        claims.sub = "nobody".to_string();
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::InvalidSubject));

        let mut claims = claims_at(now);
        claims.jti = String::new();
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::MissingSessionId));
    }
}
