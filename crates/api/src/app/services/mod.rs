//! Application services: orchestration between HTTP handlers, the pure
//! auth/domain crates and the stores.

use std::sync::Arc;

use thiserror::Error;

use doctrack_auth::{AuthzError, CreateUser, Hs256Jwt, PasswordError, Role, TokenError};
use doctrack_core::{DomainError, validate};
use doctrack_infra::store::{self, Stores};
use doctrack_infra::{AppConfig, BootstrapAdmin, ClientStore, ContractStore, StoreError, UserStore};

pub mod clients;
pub mod contracts;
pub mod session;
pub mod users;

pub use clients::ClientView;
pub use session::LoginResponse;
pub use contracts::DeleteContractResponse;
pub use users::DeleteUserResponse;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<AuthzError> for ServiceError {
    fn from(e: AuthzError) -> Self {
        match e {
            AuthzError::OutOfScope(msg) => ServiceError::Domain(DomainError::forbidden(msg)),
            other => ServiceError::Domain(DomainError::forbidden(other.to_string())),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(e: PasswordError) -> Self {
        ServiceError::Internal(e.to_string())
    }
}

impl From<TokenError> for ServiceError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(msg) => ServiceError::Internal(msg),
            _ => ServiceError::Domain(DomainError::unauthenticated("Token inválido o expirado")),
        }
    }
}

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub users: Arc<dyn UserStore>,
    pub clients: Arc<dyn ClientStore>,
    pub contracts: Arc<dyn ContractStore>,
    pub jwt: Arc<Hs256Jwt>,
}

impl AppServices {
    pub fn new(stores: Stores, jwt: Hs256Jwt) -> Self {
        Self {
            users: stores.users,
            clients: stores.clients,
            contracts: stores.contracts,
            jwt: Arc::new(jwt),
        }
    }

    /// In-memory services (tests and local development).
    pub fn in_memory(jwt_secret: &str, ttl: chrono::Duration) -> Self {
        let store = Arc::new(store::InMemoryStore::new());
        Self::new(Stores::from_shared(store), Hs256Jwt::new(jwt_secret.as_bytes(), ttl))
    }

    /// Create the configured administrator unless a user with that email
    /// already exists.
    pub async fn bootstrap_admin(&self, admin: &BootstrapAdmin) -> ServiceResult<()> {
        let email = validate::normalize_email(&admin.email);
        if self.users.find_user_by_email(&email).await?.is_some() {
            return Ok(());
        }
        let body = CreateUser {
            nombre_completo: admin.name.clone(),
            email,
            telefono: None,
            password: admin.password.clone(),
            rol: Role::Administrator.as_str().to_string(),
            foto_url: None,
            activo: Some(true),
        };
        let created = self.create_user(body).await?;
        tracing::info!(user_id = %created.id, "bootstrap administrator created");
        Ok(())
    }
}

/// Build services from configuration: Postgres when `DATABASE_URL` is set,
/// otherwise in-memory. Runs the administrator bootstrap.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let stores = store::connect(config.database_url.as_deref(), config.database_max_connections).await?;
    let services = AppServices::new(stores, Hs256Jwt::new(config.jwt_secret.as_bytes(), config.jwt_ttl));
    if let Some(admin) = &config.bootstrap_admin {
        services.bootstrap_admin(admin).await?;
    }
    Ok(services)
}

/// Run a CPU-heavy closure (password hashing) off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> ServiceResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PasswordError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Internal(format!("blocking task failed: {e}")))?
        .map_err(ServiceError::from)
}
