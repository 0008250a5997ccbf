use std::str::FromStr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, Query, Request};
use axum::http::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `GET /usuarios/buscar` query string.
#[derive(Debug, Default, Deserialize)]
pub struct UserSearchParams {
    pub rol: Option<String>,
    pub q: Option<String>,
}

// -------------------------
// Extraction helpers
// -------------------------

/// JSON body extractor whose rejections use the API error shape (400).
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = axum::response::Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection_to_response(rejection)),
        }
    }
}

fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    errors::json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

/// Unwrap a query-string extraction, mapping rejections to the API error
/// shape (400).
pub fn query_params<T>(extracted: Result<Query<T>, QueryRejection>) -> Result<T, axum::response::Response> {
    extracted
        .map(|Query(params)| params)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()))
}

/// Parse a positive numeric path id.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse::<T>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("{what} debe ser un entero positivo"),
        )
    })
}
