use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use doctrack_clients::Client;
use doctrack_core::{ClientId, ContractId, DomainError, DomainResult, Entity, nullable};

/// Largest magnitude storable in `numeric(10,2)`, exclusive.
const AMOUNT_LIMIT: i64 = 100_000_000;
const AMOUNT_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contract {
    pub id: ContractId,
    #[serde(rename = "cliente_id")]
    pub client_id: ClientId,
    #[serde(rename = "fecha_firma")]
    pub signed_on: Option<NaiveDate>,
    #[serde(rename = "monto_total")]
    pub total_amount: Option<Decimal>,
    /// Opaque reference to the signature artifact. Present means signed.
    #[serde(rename = "firma")]
    pub signature: Option<String>,
    #[serde(rename = "creado_en")]
    pub created_at: DateTime<Utc>,
}

impl Contract {
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

impl Entity for Contract {
    type Id = ContractId;

    fn id(&self) -> ContractId {
        self.id
    }
}

/// A contract joined with its owning client, as returned by every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractRecord {
    #[serde(flatten)]
    pub contract: Contract,
    #[serde(rename = "cliente")]
    pub client: Client,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContract {
    pub client_id: ClientId,
    pub signed_on: Option<NaiveDate>,
    pub total_amount: Option<Decimal>,
    pub signature: Option<String>,
}

fn check_amount(amount: Decimal) -> DomainResult<Decimal> {
    let amount = amount.normalize();
    if amount.scale() > AMOUNT_SCALE {
        return Err(DomainError::validation("monto_total admite como máximo 2 decimales"));
    }
    if amount.abs() >= Decimal::from(AMOUNT_LIMIT) {
        return Err(DomainError::validation("monto_total excede el máximo permitido"));
    }
    Ok(amount)
}

fn clean_signature(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// `POST /contratos` body. `monto_total` accepts a JSON number or a numeric
/// string.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateContract {
    pub cliente_id: ClientId,
    #[serde(default)]
    pub fecha_firma: Option<NaiveDate>,
    #[serde(default)]
    pub monto_total: Option<Decimal>,
    #[serde(default)]
    pub firma: Option<String>,
}

impl CreateContract {
    pub fn validate(self) -> DomainResult<NewContract> {
        Ok(NewContract {
            client_id: self.cliente_id,
            signed_on: self.fecha_firma,
            total_amount: self.monto_total.map(check_amount).transpose()?,
            signature: clean_signature(self.firma),
        })
    }
}

/// `PUT /contratos/:id` body. Nullable fields accept `null` to clear.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateContract {
    #[serde(default)]
    pub cliente_id: Option<ClientId>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub fecha_firma: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub monto_total: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub firma: Option<Option<String>>,
}

impl UpdateContract {
    /// The owning client requested by this update when it differs from the
    /// current one.
    pub fn reassignment(&self, current: &Contract) -> Option<ClientId> {
        self.cliente_id.filter(|id| *id != current.client_id)
    }

    /// Validate and apply. Callers check scope and the existence of a new
    /// owning client beforehand.
    pub fn apply_to(self, contract: &mut Contract) -> DomainResult<()> {
        let amount = match self.monto_total {
            Some(Some(a)) => Some(Some(check_amount(a)?)),
            other => other,
        };
        if let Some(id) = self.cliente_id {
            contract.client_id = id;
        }
        if let Some(date) = self.fecha_firma {
            contract.signed_on = date;
        }
        if let Some(amount) = amount {
            contract.total_amount = amount;
        }
        if let Some(sig) = self.firma {
            contract.signature = clean_signature(sig);
        }
        Ok(())
    }
}
