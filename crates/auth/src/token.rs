//! Bearer-token signing and verification (HS256 JWT).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{SessionClaims, TokenValidationError, validate_claims};
use crate::user::User;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// A freshly signed token and the claims it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub claims: SessionClaims,
}

/// Mints bearer tokens for a user and session identifier.
pub trait JwtIssuer: Send + Sync {
    fn issue(&self, user: &User, session_id: &str, now: DateTime<Utc>) -> Result<IssuedToken, TokenError>;
}

/// Verifies signature and time window, returning the claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError>;
}

/// HMAC-SHA256 signer/validator over a shared server secret.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Hs256Jwt {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl JwtIssuer for Hs256Jwt {
    fn issue(&self, user: &User, session_id: &str, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let claims = SessionClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            rol: user.role.as_str().to_string(),
            jti: session_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        // Expiry is checked against the caller's clock in `validate_claims`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use doctrack_core::UserId;

    fn user() -> User {
        User::fixture(UserId::new(7), "a@x.com", Role::Client)
    }

    #[test]
    fn issued_token_validates_and_carries_session() {
        let jwt = Hs256Jwt::new(b"test-secret", Duration::days(1));
        let now = Utc::now();
        let issued = jwt.issue(&user(), "abc123", now).unwrap();

        let claims = jwt.validate(&issued.token, now).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.rol, "cliente");
        assert_eq!(claims.jti, "abc123");
        assert_eq!(claims.exp - claims.iat, Duration::days(1).num_seconds());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let issued = Hs256Jwt::new(b"one", Duration::days(1)).issue(&user(), "s", now).unwrap();
        let err = Hs256Jwt::new(b"two", Duration::days(1)).validate(&issued.token, now).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[test]
    fn expiry_is_absolute() {
        let jwt = Hs256Jwt::new(b"test-secret", Duration::hours(1));
        let now = Utc::now();
        let issued = jwt.issue(&user(), "s", now).unwrap();
        let err = jwt.validate(&issued.token, now + Duration::hours(1)).unwrap_err();
        assert_eq!(err, TokenError::Claims(TokenValidationError::Expired));
    }

    #[test]
    fn garbage_is_rejected() {
        let jwt = Hs256Jwt::new(b"test-secret", Duration::hours(1));
        assert!(matches!(jwt.validate("not-a-jwt", Utc::now()), Err(TokenError::Invalid(_))));
    }
}
