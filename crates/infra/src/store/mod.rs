//! Storage abstractions for users, clients and contracts.
//!
//! Every write is a single-row operation; the store is the only
//! synchronization point between concurrent requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use doctrack_auth::{ContractScope, NewUser, Role, User};
use doctrack_clients::{Client, NewClient};
use doctrack_contracts::{Contract, ContractPage, ContractQuery, ContractRecord, NewContract};
use doctrack_core::{ClientId, ContractId, UserId};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint rejected the write (duplicate email).
    #[error("unique violation: {0}")]
    Unique(String),

    /// The write references a missing row, or a delete would orphan others.
    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    #[error("failed to decode row: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> StoreResult<User>;
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;
    /// Users with the given ids, in no particular order; missing ids are skipped.
    async fn get_users(&self, ids: &[UserId]) -> StoreResult<Vec<User>>;
    /// Lookup by normalized email.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// All users ordered by name.
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Users of `role` whose name or email contains `text` (case-insensitive),
    /// ordered by name.
    async fn search_users(&self, role: Role, text: Option<&str>, limit: u32) -> StoreResult<Vec<User>>;
    /// Overwrite the profile columns. The session token and last access are
    /// only written by [`UserStore::set_session`].
    async fn save_user(&self, user: &User) -> StoreResult<()>;
    /// Replace the session token in one row update. `accessed_at` also
    /// records the last access when given. Returns whether the user exists.
    async fn set_session(
        &self,
        id: UserId,
        token: Option<&str>,
        accessed_at: Option<DateTime<Utc>>,
    ) -> StoreResult<bool>;
    async fn delete_user(&self, id: UserId) -> StoreResult<bool>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn insert_client(&self, client: NewClient, now: DateTime<Utc>) -> StoreResult<Client>;
    async fn get_client(&self, id: ClientId) -> StoreResult<Option<Client>>;
    /// The profile owned by `owner`; the oldest one if several exist.
    async fn find_client_by_owner(&self, owner: UserId) -> StoreResult<Option<Client>>;
    /// Newest first.
    async fn list_clients(&self) -> StoreResult<Vec<Client>>;
    /// Clients assigned to `preparer`, newest first.
    async fn list_clients_by_preparer(&self, preparer: UserId) -> StoreResult<Vec<Client>>;
    async fn save_client(&self, client: &Client) -> StoreResult<()>;
    async fn delete_client(&self, id: ClientId) -> StoreResult<bool>;
}

#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn insert_contract(&self, contract: NewContract, now: DateTime<Utc>) -> StoreResult<Contract>;
    /// The contract joined with its client, ignoring scope.
    async fn get_contract(&self, id: ContractId) -> StoreResult<Option<ContractRecord>>;
    /// Filter, sort and page within `scope`.
    async fn query_contracts(
        &self,
        query: &ContractQuery,
        scope: &ContractScope,
    ) -> StoreResult<ContractPage<ContractRecord>>;
    async fn save_contract(&self, contract: &Contract) -> StoreResult<()>;
    async fn delete_contract(&self, id: ContractId) -> StoreResult<bool>;
}

/// Build a store from configuration: Postgres when a URL is given, otherwise
/// in-memory.
pub async fn connect(database_url: Option<&str>, max_connections: u32) -> StoreResult<Stores> {
    match database_url {
        Some(url) => {
            let pg = Arc::new(PostgresStore::connect(url, max_connections).await?);
            Ok(Stores::from_shared(pg))
        }
        None => {
            tracing::info!("DATABASE_URL not set; using the in-memory store");
            Ok(Stores::from_shared(Arc::new(InMemoryStore::new())))
        }
    }
}

/// The three store handles, usually backed by one object.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub clients: Arc<dyn ClientStore>,
    pub contracts: Arc<dyn ContractStore>,
}

impl Stores {
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + ClientStore + ContractStore + 'static,
    {
        Self {
            users: store.clone(),
            clients: store.clone(),
            contracts: store,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Map a sqlx error into a store error.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Unique(msg),
                Some("23503") => StoreError::ForeignKey(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            StoreError::Decode(format!("{operation}: {err}"))
        }
        sqlx::Error::PoolClosed => StoreError::Database(format!("connection pool closed in {operation}")),
        _ => StoreError::Database(format!("{operation}: {err}")),
    }
}
