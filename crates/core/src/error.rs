//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Each variant corresponds to one caller-visible failure class. The HTTP layer
/// maps them to 400/401/403/404/409; nothing here knows about status codes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or unexpected input. Rejected wholesale, never partially applied.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing, invalid, expired or superseded credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Role or ownership rule violation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A requested entity does not exist (or is outside the caller's scope).
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or referential conflict (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Human-readable message without the class prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::Unauthenticated(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_strips_class_prefix() {
        let err = DomainError::conflict("El email ya está en uso por otro usuario");
        assert_eq!(err.message(), "El email ya está en uso por otro usuario");
        assert_eq!(err.to_string(), "conflict: El email ya está en uso por otro usuario");
    }
}
