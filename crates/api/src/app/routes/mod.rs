use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::app::errors;
use crate::app::services::ServiceResult;

pub mod clients;
pub mod contracts;
pub mod system;
pub mod users;

/// Endpoints reachable without a bearer token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/usuarios/login", post(users::login))
}

/// Endpoints behind the session middleware.
pub fn protected_router() -> Router {
    Router::new()
        .merge(users::router())
        .merge(clients::router())
        .merge(contracts::router())
}

/// Serialize a service result with `status`, or map its error.
pub(crate) fn respond<T: Serialize>(status: StatusCode, result: ServiceResult<T>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
