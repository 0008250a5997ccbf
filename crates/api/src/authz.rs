//! Role guard evaluated at the top of every protected handler.

use axum::http::StatusCode;

use doctrack_auth::{Role, authorize};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Allow the request iff the principal holds one of `required` (or the set
/// is empty); otherwise a 403 response.
pub fn require_roles(principal: &PrincipalContext, required: &[Role]) -> Result<(), axum::response::Response> {
    authorize(principal.role().as_str(), required).map_err(|e| {
        tracing::warn!(user_id = %principal.id(), error = %e, "role not permitted");
        errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "No tienes permisos para realizar esta acción",
        )
    })
}

pub const ADMIN: &[Role] = &[Role::Administrator];
pub const STAFF: &[Role] = &[Role::Administrator, Role::Preparer];
pub const PREPARER: &[Role] = &[Role::Preparer];
pub const CLIENT: &[Role] = &[Role::Client];
pub const ANY_ROLE: &[Role] = &[Role::Administrator, Role::Preparer, Role::Client];
