//! Contracts, scoped per principal.
//!
//! Client-role principals only reach contracts of the client profile they
//! own: out-of-scope reads look like missing rows, out-of-scope writes are
//! forbidden.

use chrono::Utc;
use serde::Serialize;

use doctrack_auth::{ContractScope, Principal};
use doctrack_contracts::{
    ContractListParams, ContractPage, ContractQuery, ContractRecord, CreateContract, UpdateContract,
};
use doctrack_core::{ClientId, ContractId, DomainError};

use super::{AppServices, ServiceError, ServiceResult};

const CONTRACT_NOT_FOUND: &str = "Contrato no encontrado";

/// `DELETE /contratos/:id` response.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteContractResponse {
    pub success: bool,
}

fn contract_not_found() -> ServiceError {
    DomainError::not_found(CONTRACT_NOT_FOUND).into()
}

fn client_not_found() -> ServiceError {
    DomainError::not_found("Cliente no encontrado").into()
}

impl AppServices {
    async fn load_contract(&self, id: ContractId) -> ServiceResult<ContractRecord> {
        self.contracts.get_contract(id).await?.ok_or_else(contract_not_found)
    }

    pub async fn create_contract(&self, principal: &Principal, body: CreateContract) -> ServiceResult<ContractRecord> {
        let new_contract = body.validate()?;
        let client = self
            .clients
            .get_client(new_contract.client_id)
            .await?
            .ok_or_else(client_not_found)?;

        let scope = ContractScope::for_principal(principal);
        if let Err(e) = scope.ensure_permits(client.owner_id, "No puedes crear contratos para otro cliente.") {
            tracing::warn!(user_id = %principal.id, client_id = %client.id, "contract creation out of scope");
            return Err(e.into());
        }

        let contract = self.contracts.insert_contract(new_contract, Utc::now()).await?;
        tracing::info!(contract_id = %contract.id, client_id = %contract.client_id, "contract created");
        self.load_contract(contract.id).await
    }

    pub async fn list_contracts(
        &self,
        principal: &Principal,
        params: ContractListParams,
    ) -> ServiceResult<ContractPage<ContractRecord>> {
        let query = ContractQuery::try_from(params)?;
        self.query_contracts(principal, &query).await
    }

    /// `GET /contratos/cliente/:clienteId`.
    pub async fn list_client_contracts(
        &self,
        principal: &Principal,
        client_id: ClientId,
    ) -> ServiceResult<ContractPage<ContractRecord>> {
        self.query_contracts(principal, &ContractQuery::for_client(client_id)).await
    }

    async fn query_contracts(
        &self,
        principal: &Principal,
        query: &ContractQuery,
    ) -> ServiceResult<ContractPage<ContractRecord>> {
        let scope = ContractScope::for_principal(principal);
        Ok(self.contracts.query_contracts(query, &scope).await?)
    }

    pub async fn get_contract(&self, principal: &Principal, id: ContractId) -> ServiceResult<ContractRecord> {
        let record = self.load_contract(id).await?;
        if !ContractScope::for_principal(principal).permits(record.client.owner_id) {
            return Err(contract_not_found());
        }
        Ok(record)
    }

    pub async fn update_contract(
        &self,
        principal: &Principal,
        id: ContractId,
        body: UpdateContract,
    ) -> ServiceResult<ContractRecord> {
        let record = self.load_contract(id).await?;
        let scope = ContractScope::for_principal(principal);
        if let Err(e) = scope.ensure_permits(record.client.owner_id, "No puedes modificar contratos de otro cliente.") {
            tracing::warn!(user_id = %principal.id, contract_id = %id, "contract update out of scope");
            return Err(e.into());
        }

        if let Some(new_client) = body.reassignment(&record.contract) {
            if let Err(e) = scope.ensure_may_reassign() {
                tracing::warn!(user_id = %principal.id, contract_id = %id, "contract reassignment refused");
                return Err(e.into());
            }
            if self.clients.get_client(new_client).await?.is_none() {
                return Err(client_not_found());
            }
        }

        let mut contract = record.contract;
        body.apply_to(&mut contract)?;
        self.contracts.save_contract(&contract).await?;
        self.load_contract(id).await
    }

    pub async fn delete_contract(&self, id: ContractId) -> ServiceResult<DeleteContractResponse> {
        if !self.contracts.delete_contract(id).await? {
            return Err(contract_not_found());
        }
        tracing::info!(contract_id = %id, "contract deleted");
        Ok(DeleteContractResponse { success: true })
    }
}
