use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use doctrack_auth::{CreateUser, UpdateUser};
use doctrack_core::UserId;

use crate::app::dto::{self, ApiJson};
use crate::app::routes::respond;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/usuarios/me", get(me))
        .route("/usuarios/logout", post(logout))
        .route("/usuarios/buscar", get(search_users))
        .route("/usuarios", get(list_users).post(create_user))
        .route("/usuarios/:id", get(get_user).put(update_user).delete(delete_user))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::LoginRequest>,
) -> Response {
    respond(StatusCode::OK, services.login(&body.email, &body.password).await)
}

pub async fn me(Extension(principal): Extension<PrincipalContext>) -> Response {
    (StatusCode::OK, Json(principal.principal().to_view())).into_response()
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    let result = services
        .logout(principal.principal())
        .await
        .map(|()| serde_json::json!({ "mensaje": "Logout exitoso" }));
    respond(StatusCode::OK, result)
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ADMIN) {
        return resp;
    }
    respond(StatusCode::OK, services.list_users().await)
}

pub async fn search_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    params: Result<Query<dto::UserSearchParams>, QueryRejection>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::STAFF) {
        return resp;
    }
    let params = match dto::query_params(params) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services.search_users(params.rol.as_deref(), params.q.as_deref()).await,
    )
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<ApiJson<CreateUser>, Response>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ADMIN) {
        return resp;
    }
    let ApiJson(body) = match body {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    respond(StatusCode::CREATED, services.create_user(body).await)
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ADMIN) {
        return resp;
    }
    let id: UserId = match dto::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.get_user(id).await)
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<ApiJson<UpdateUser>, Response>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ADMIN) {
        return resp;
    }
    let id: UserId = match dto::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let ApiJson(body) = match body {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.update_user(id, body).await)
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ADMIN) {
        return resp;
    }
    let id: UserId = match dto::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.delete_user(id).await)
}
