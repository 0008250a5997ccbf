use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};

use doctrack_contracts::{ContractListParams, CreateContract, UpdateContract};
use doctrack_core::{ClientId, ContractId};

use crate::app::dto::{self, ApiJson};
use crate::app::routes::respond;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/contratos", post(create_contract).get(list_contracts))
        .route("/contratos/cliente/:cliente_id", get(list_client_contracts))
        .route(
            "/contratos/:id",
            get(get_contract).put(update_contract).delete(delete_contract),
        )
}

pub async fn create_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<ApiJson<CreateContract>, Response>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ANY_ROLE) {
        return resp;
    }
    let ApiJson(body) = match body {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::CREATED,
        services.create_contract(principal.principal(), body).await,
    )
}

pub async fn list_contracts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    params: Result<Query<ContractListParams>, QueryRejection>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ANY_ROLE) {
        return resp;
    }
    let params = match dto::query_params(params) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services.list_contracts(principal.principal(), params).await,
    )
}

pub async fn list_client_contracts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(cliente_id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ANY_ROLE) {
        return resp;
    }
    let client_id: ClientId = match dto::parse_id(&cliente_id, "clienteId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services
            .list_client_contracts(principal.principal(), client_id)
            .await,
    )
}

pub async fn get_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ANY_ROLE) {
        return resp;
    }
    let id: ContractId = match dto::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services.get_contract(principal.principal(), id).await,
    )
}

pub async fn update_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<ApiJson<UpdateContract>, Response>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::ANY_ROLE) {
        return resp;
    }
    let id: ContractId = match dto::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let ApiJson(body) = match body {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services
            .update_contract(principal.principal(), id, body)
            .await,
    )
}

pub async fn delete_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require_roles(&principal, authz::STAFF) {
        return resp;
    }
    let id: ContractId = match dto::parse_id(&id, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.delete_contract(id).await)
}
