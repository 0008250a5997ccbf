//! In-memory store for tests and local development.
//!
//! Enforces the same unique and foreign-key rules as the Postgres schema so
//! both backends reject the same writes.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use doctrack_auth::{ContractScope, NewUser, Role, User};
use doctrack_clients::{Client, NewClient};
use doctrack_contracts::{Contract, ContractPage, ContractQuery, ContractRecord, NewContract};
use doctrack_core::{ClientId, ContractId, Entity, UserId};

use super::{ClientStore, ContractStore, StoreError, StoreResult, UserStore};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    clients: BTreeMap<ClientId, Client>,
    contracts: BTreeMap<ContractId, Contract>,
    last_user: i64,
    last_client: i64,
    last_contract: i64,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn check_user_ref(&self, id: Option<UserId>, column: &str) -> StoreResult<()> {
        match id {
            Some(id) if !self.users.contains_key(&id) => {
                Err(StoreError::ForeignKey(format!("clientes.{column} references missing user {id}")))
            }
            _ => Ok(()),
        }
    }

    fn check_client_ref(&self, id: ClientId) -> StoreResult<()> {
        if self.clients.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKey(format!("contratos.cliente_id references missing client {id}")))
        }
    }

    fn record(&self, contract: &Contract) -> Option<ContractRecord> {
        self.clients.get(&contract.client_id).map(|client| ContractRecord {
            contract: contract.clone(),
            client: client.clone(),
        })
    }
}

/// Upsert by entity id.
fn put<E: Entity + Clone>(table: &mut BTreeMap<E::Id, E>, row: &E) {
    table.insert(row.id(), row.clone());
}

fn by_name(a: &User, b: &User) -> std::cmp::Ordering {
    a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id))
}

fn newest_first(a: &Client, b: &Client) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

/// Single-lock in-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Database("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Database("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, new: NewUser, now: DateTime<Utc>) -> StoreResult<User> {
        let mut t = self.write()?;
        if t.email_taken(&new.email, None) {
            return Err(StoreError::Unique(format!("usuarios.email {}", new.email)));
        }
        t.last_user += 1;
        let user = User {
            id: UserId::new(t.last_user),
            full_name: new.full_name,
            email: new.email,
            phone: new.phone,
            password_hash: new.password_hash,
            role: new.role,
            photo_url: new.photo_url,
            session_token: None,
            active: new.active,
            last_access: None,
            created_at: now,
            updated_at: now,
        };
        put(&mut t.users, &user);
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn get_users(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        let t = self.read()?;
        Ok(ids.iter().filter_map(|id| t.users.get(id).cloned()).collect())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        users.sort_by(by_name);
        Ok(users)
    }

    async fn search_users(&self, role: Role, text: Option<&str>, limit: u32) -> StoreResult<Vec<User>> {
        let needle = text.map(str::to_lowercase);
        let mut users: Vec<User> = self
            .read()?
            .users
            .values()
            .filter(|u| u.role == role)
            .filter(|u| match &needle {
                Some(n) => u.full_name.to_lowercase().contains(n) || u.email.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect();
        users.sort_by(by_name);
        users.truncate(limit as usize);
        Ok(users)
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::Unique(format!("usuarios.email {}", user.email)));
        }
        let Some(current) = t.users.get(&user.id) else {
            return Ok(());
        };
        let mut row = user.clone();
        row.session_token = current.session_token.clone();
        row.last_access = current.last_access;
        put(&mut t.users, &row);
        Ok(())
    }

    async fn set_session(
        &self,
        id: UserId,
        token: Option<&str>,
        accessed_at: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        let mut t = self.write()?;
        match t.users.get_mut(&id) {
            Some(user) => {
                user.session_token = token.map(str::to_string);
                if accessed_at.is_some() {
                    user.last_access = accessed_at;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if !t.users.contains_key(&id) {
            return Ok(false);
        }
        if t.clients.values().any(|c| c.owner_id == Some(id) || c.preparer_id == Some(id)) {
            return Err(StoreError::ForeignKey(format!("usuario {id} is referenced by clientes")));
        }
        t.users.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl ClientStore for InMemoryStore {
    async fn insert_client(&self, new: NewClient, now: DateTime<Utc>) -> StoreResult<Client> {
        let mut t = self.write()?;
        t.check_user_ref(new.owner_id, "usuario_id")?;
        t.check_user_ref(new.preparer_id, "preparador_id")?;
        t.last_client += 1;
        let client = Client {
            id: ClientId::new(t.last_client),
            details: new.details,
            owner_id: new.owner_id,
            preparer_id: new.preparer_id,
            created_at: now,
            updated_at: now,
        };
        put(&mut t.clients, &client);
        Ok(client)
    }

    async fn get_client(&self, id: ClientId) -> StoreResult<Option<Client>> {
        Ok(self.read()?.clients.get(&id).cloned())
    }

    async fn find_client_by_owner(&self, owner: UserId) -> StoreResult<Option<Client>> {
        Ok(self
            .read()?
            .clients
            .values()
            .find(|c| c.owner_id == Some(owner))
            .cloned())
    }

    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        let mut clients: Vec<Client> = self.read()?.clients.values().cloned().collect();
        clients.sort_by(newest_first);
        Ok(clients)
    }

    async fn list_clients_by_preparer(&self, preparer: UserId) -> StoreResult<Vec<Client>> {
        let mut clients: Vec<Client> = self
            .read()?
            .clients
            .values()
            .filter(|c| c.preparer_id == Some(preparer))
            .cloned()
            .collect();
        clients.sort_by(newest_first);
        Ok(clients)
    }

    async fn save_client(&self, client: &Client) -> StoreResult<()> {
        let mut t = self.write()?;
        t.check_user_ref(client.owner_id, "usuario_id")?;
        t.check_user_ref(client.preparer_id, "preparador_id")?;
        if t.clients.contains_key(&client.id) {
            put(&mut t.clients, client);
        }
        Ok(())
    }

    async fn delete_client(&self, id: ClientId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if !t.clients.contains_key(&id) {
            return Ok(false);
        }
        if t.contracts.values().any(|c| c.client_id == id) {
            return Err(StoreError::ForeignKey(format!("cliente {id} is referenced by contratos")));
        }
        t.clients.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl ContractStore for InMemoryStore {
    async fn insert_contract(&self, new: NewContract, now: DateTime<Utc>) -> StoreResult<Contract> {
        let mut t = self.write()?;
        t.check_client_ref(new.client_id)?;
        t.last_contract += 1;
        let contract = Contract {
            id: ContractId::new(t.last_contract),
            client_id: new.client_id,
            signed_on: new.signed_on,
            total_amount: new.total_amount,
            signature: new.signature,
            created_at: now,
        };
        put(&mut t.contracts, &contract);
        Ok(contract)
    }

    async fn get_contract(&self, id: ContractId) -> StoreResult<Option<ContractRecord>> {
        let t = self.read()?;
        Ok(t.contracts.get(&id).and_then(|c| t.record(c)))
    }

    async fn query_contracts(
        &self,
        query: &ContractQuery,
        scope: &ContractScope,
    ) -> StoreResult<ContractPage<ContractRecord>> {
        let records: Vec<ContractRecord> = {
            let t = self.read()?;
            t.contracts
                .values()
                .filter_map(|c| t.record(c))
                .filter(|r| scope.permits(r.client.owner_id))
                .collect()
        };
        Ok(query.evaluate(records))
    }

    async fn save_contract(&self, contract: &Contract) -> StoreResult<()> {
        let mut t = self.write()?;
        t.check_client_ref(contract.client_id)?;
        if t.contracts.contains_key(&contract.id) {
            put(&mut t.contracts, contract);
        }
        Ok(())
    }

    async fn delete_contract(&self, id: ContractId) -> StoreResult<bool> {
        Ok(self.write()?.contracts.remove(&id).is_some())
    }
}
