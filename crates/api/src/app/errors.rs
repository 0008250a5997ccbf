use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use doctrack_core::DomainError;
use doctrack_infra::StoreError;

use crate::app::services::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(StoreError::Unique(msg)) => {
            tracing::info!(error = %msg, "unique violation");
            json_error(StatusCode::CONFLICT, "conflict", "El registro ya existe")
        }
        ServiceError::Store(StoreError::ForeignKey(msg)) => {
            tracing::info!(error = %msg, "foreign key violation");
            json_error(StatusCode::CONFLICT, "conflict", "El registro está referenciado por otros datos")
        }
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "Error interno del servidor")
        }
        ServiceError::Internal(msg) => {
            tracing::error!(error = %msg, "internal failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Error interno del servidor")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let (status, code) = match &err {
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        DomainError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
        DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
    };
    json_error(status, code, err.message())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
