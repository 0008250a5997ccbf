//! Client profiles.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;

use doctrack_auth::{Principal, UserSummary};
use doctrack_clients::{Client, CreateClient, UpdateClient, UpdateOwnProfile};
use doctrack_core::{ClientId, DomainError, UserId};
use doctrack_infra::StoreError;

use super::{AppServices, ServiceError, ServiceResult};

const CLIENT_NOT_FOUND: &str = "Cliente no encontrado";
const PROFILE_NOT_FOUND: &str = "No se encontró perfil de cliente asociado";

/// A client with its owning user and assigned preparer embedded.
#[derive(Debug, Clone, Serialize)]
pub struct ClientView {
    #[serde(flatten)]
    pub client: Client,
    pub usuario: Option<UserSummary>,
    pub preparador: Option<UserSummary>,
}

fn client_not_found() -> ServiceError {
    DomainError::not_found(CLIENT_NOT_FOUND).into()
}

impl AppServices {
    async fn require_user(&self, id: UserId, what: &str) -> ServiceResult<()> {
        match self.users.get_user(id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found(format!("{what} con ID {id} no encontrado")).into()),
        }
    }

    async fn client_views(&self, clients: Vec<Client>) -> ServiceResult<Vec<ClientView>> {
        let mut ids: Vec<UserId> = clients
            .iter()
            .flat_map(|c| [c.owner_id, c.preparer_id])
            .flatten()
            .collect();
        ids.sort();
        ids.dedup();
        let users: HashMap<UserId, UserSummary> = self
            .users
            .get_users(&ids)
            .await?
            .iter()
            .map(|u| (u.id, u.to_summary()))
            .collect();

        Ok(clients
            .into_iter()
            .map(|client| ClientView {
                usuario: client.owner_id.and_then(|id| users.get(&id).cloned()),
                preparador: client.preparer_id.and_then(|id| users.get(&id).cloned()),
                client,
            })
            .collect())
    }

    async fn client_view(&self, client: Client) -> ServiceResult<ClientView> {
        let mut views = self.client_views(vec![client]).await?;
        views.pop().ok_or_else(|| ServiceError::Internal("empty client view".to_string()))
    }

    /// `POST /clientes`: owned by the creator, who is also the default preparer.
    pub async fn create_client(&self, principal: &Principal, body: CreateClient) -> ServiceResult<ClientView> {
        self.create_client_owned_by(principal, principal.id, body).await
    }

    /// `POST /clientes/de-usuario/:usuarioId`: owned by `owner`.
    pub async fn create_client_for_user(
        &self,
        principal: &Principal,
        owner: UserId,
        body: CreateClient,
    ) -> ServiceResult<ClientView> {
        self.require_user(owner, "Usuario").await?;
        self.create_client_owned_by(principal, owner, body).await
    }

    async fn create_client_owned_by(
        &self,
        principal: &Principal,
        owner: UserId,
        body: CreateClient,
    ) -> ServiceResult<ClientView> {
        if let Some(preparer) = body.preparador_id {
            self.require_user(preparer, "Preparador").await?;
        }
        let new_client = body.into_new_client(owner, principal.id)?;
        let client = self.clients.insert_client(new_client, Utc::now()).await?;
        tracing::info!(
            client_id = %client.id,
            owner = ?client.owner_id,
            preparer = ?client.preparer_id,
            "client created"
        );
        self.client_view(client).await
    }

    pub async fn list_clients(&self) -> ServiceResult<Vec<ClientView>> {
        let clients = self.clients.list_clients().await?;
        self.client_views(clients).await
    }

    /// Clients assigned to the calling preparer.
    pub async fn list_my_clients(&self, principal: &Principal) -> ServiceResult<Vec<ClientView>> {
        let clients = self.clients.list_clients_by_preparer(principal.id).await?;
        self.client_views(clients).await
    }

    pub async fn get_client(&self, id: ClientId) -> ServiceResult<ClientView> {
        let client = self.clients.get_client(id).await?.ok_or_else(client_not_found)?;
        self.client_view(client).await
    }

    /// The profile owned by the calling client user.
    pub async fn my_profile(&self, principal: &Principal) -> ServiceResult<ClientView> {
        let client = self
            .clients
            .find_client_by_owner(principal.id)
            .await?
            .ok_or_else(|| ServiceError::from(DomainError::not_found(PROFILE_NOT_FOUND)))?;
        self.client_view(client).await
    }

    /// Edit the caller's own profile, creating it on first use.
    pub async fn upsert_my_profile(&self, principal: &Principal, body: UpdateOwnProfile) -> ServiceResult<ClientView> {
        let now = Utc::now();
        let client = match self.clients.find_client_by_owner(principal.id).await? {
            Some(mut existing) => {
                body.apply_to(&mut existing, now)?;
                self.clients.save_client(&existing).await?;
                existing
            }
            None => {
                let new_client = body.into_new_client(principal.id)?;
                let created = self.clients.insert_client(new_client, now).await?;
                tracing::info!(client_id = %created.id, user_id = %principal.id, "client profile created by owner");
                created
            }
        };
        self.client_view(client).await
    }

    /// Partial update; `preparador_id: null` unassigns the preparer.
    pub async fn update_client(&self, id: ClientId, body: UpdateClient) -> ServiceResult<ClientView> {
        let mut client = self.clients.get_client(id).await?.ok_or_else(client_not_found)?;
        if let Some(Some(preparer)) = body.preparer_change() {
            self.require_user(preparer, "Preparador").await?;
        }
        body.apply_to(&mut client, Utc::now())?;
        self.clients.save_client(&client).await?;
        self.client_view(client).await
    }

    pub async fn delete_client(&self, id: ClientId) -> ServiceResult<()> {
        let deleted = self.clients.delete_client(id).await.map_err(|e| match e {
            StoreError::ForeignKey(_) => ServiceError::from(DomainError::conflict(
                "No se puede eliminar el cliente: tiene contratos asociados",
            )),
            other => other.into(),
        })?;
        if !deleted {
            return Err(client_not_found());
        }
        tracing::info!(client_id = %id, "client deleted");
        Ok(())
    }
}
