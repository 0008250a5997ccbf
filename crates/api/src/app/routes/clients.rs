use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};

use doctrack_clients::{CreateClient, UpdateClient, UpdateOwnProfile};
use doctrack_core::{ClientId, UserId};

use crate::app::dto::{self, ApiJson};
use crate::app::errors;
use crate::app::routes::respond;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/clientes", post(create_client).get(list_clients))
        .route("/clientes/de-usuario/:usuario_id", post(create_client_for_user))
        .route("/clientes/mios", get(list_my_clients))
        .route("/clientes/mi-perfil", get(my_profile).put(update_my_profile))
        .route(
            "/clientes/:id",
            get(get_client).put(update_client).delete(delete_client),
        )
}

pub async fn create_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<ApiJson<CreateClient>, Response>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::STAFF) {
        return resp;
    }
    let ApiJson(body) = match body {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::CREATED,
        services.create_client(principal.principal(), body).await,
    )
}

pub async fn create_client_for_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(usuario_id): Path<String>,
    body: Result<ApiJson<CreateClient>, Response>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::STAFF) {
        return resp;
    }
    let owner: UserId = match dto::parse_id(&usuario_id, "usuarioId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let ApiJson(body) = match body {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::CREATED,
        services
            .create_client_for_user(principal.principal(), owner, body)
            .await,
    )
}

pub async fn list_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ADMIN) {
        return resp;
    }
    respond(StatusCode::OK, services.list_clients().await)
}

pub async fn list_my_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::PREPARER) {
        return resp;
    }
    respond(
        StatusCode::OK,
        services.list_my_clients(principal.principal()).await,
    )
}

pub async fn my_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::CLIENT) {
        return resp;
    }
    respond(StatusCode::OK, services.my_profile(principal.principal()).await)
}

pub async fn update_my_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<ApiJson<UpdateOwnProfile>, Response>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::CLIENT) {
        return resp;
    }
    let ApiJson(body) = match body {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services.upsert_my_profile(principal.principal(), body).await,
    )
}

pub async fn get_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::STAFF) {
        return resp;
    }
    let id: ClientId = match dto::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.get_client(id).await)
}

pub async fn update_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<ApiJson<UpdateClient>, Response>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::STAFF) {
        return resp;
    }
    let id: ClientId = match dto::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let ApiJson(body) = match body {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.update_client(id, body).await)
}

pub async fn delete_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ADMIN) {
        return resp;
    }
    let id: ClientId = match dto::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.delete_client(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
