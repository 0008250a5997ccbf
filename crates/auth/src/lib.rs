//! `doctrack-auth`: authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it owns the user
//! entity, credential hashing, session identifiers, bearer-token signing and the
//! pure role/ownership decisions. Orchestration (loading users, persisting the
//! session identifier) lives with the callers.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod principal;
pub mod roles;
pub mod scope;
pub mod session;
pub mod token;
pub mod user;

pub use authorize::{AuthzError, authorize};
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use password::{PasswordError, hash_password, verify_password};
pub use principal::{Principal, PrincipalView};
pub use roles::Role;
pub use scope::ContractScope;
pub use session::{SESSION_ID_BYTES, new_session_id};
pub use token::{Hs256Jwt, IssuedToken, JwtIssuer, JwtValidator, TokenError};
pub use user::{CreateUser, NewUser, PublicUser, UpdateUser, User, UserChanges, UserSummary};
