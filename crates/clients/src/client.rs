use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use doctrack_core::{ClientId, DomainResult, Entity, UserId, nullable, validate};

/// Contracted service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "inicial")]
    Initial,
    #[serde(rename = "renovacion")]
    Renewal,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Initial => "inicial",
            ServiceType::Renewal => "renovacion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inicial" => Some(ServiceType::Initial),
            "renovacion" => Some(ServiceType::Renewal),
            _ => None,
        }
    }
}

/// Client lifecycle label. No transition rules: any state may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClientState {
    #[default]
    #[serde(rename = "nuevo")]
    New,
    #[serde(rename = "evaluando")]
    Evaluating,
    #[serde(rename = "activo")]
    Active,
    #[serde(rename = "cerrado")]
    Closed,
}

impl ClientState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientState::New => "nuevo",
            ClientState::Evaluating => "evaluando",
            ClientState::Active => "activo",
            ClientState::Closed => "cerrado",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "nuevo" => Some(ClientState::New),
            "evaluando" => Some(ClientState::Evaluating),
            "activo" => Some(ClientState::Active),
            "cerrado" => Some(ClientState::Closed),
            _ => None,
        }
    }
}

/// Personal data and process flags of a client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ClientDetails {
    #[serde(rename = "nombre_completo")]
    pub full_name: Option<String>,
    #[serde(rename = "pasaporte")]
    pub passport: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    #[serde(rename = "canal_entrada")]
    pub intake_channel: Option<String>,
    #[serde(rename = "cita_pagada")]
    pub appointment_paid: bool,
    #[serde(rename = "tramite_contratado")]
    pub service_type: Option<ServiceType>,
    #[serde(rename = "contrato_firmado")]
    pub contract_signed: bool,
    #[serde(rename = "pago_anticipo")]
    pub advance_paid: bool,
    #[serde(rename = "estado_cliente")]
    pub state: ClientState,
}

/// A client profile.
///
/// # Invariants
/// - `owner_id` (the account representing the client) is never changed by a
///   preparer reassignment.
/// - `preparer_id` may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Client {
    pub id: ClientId,
    #[serde(flatten)]
    pub details: ClientDetails,
    #[serde(rename = "usuario_id")]
    pub owner_id: Option<UserId>,
    #[serde(rename = "preparador_id")]
    pub preparer_id: Option<UserId>,
    #[serde(rename = "creado_en")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "actualizado_en")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Client {
    type Id = ClientId;

    fn id(&self) -> ClientId {
        self.id
    }
}

/// Insertable client record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub details: ClientDetails,
    pub owner_id: Option<UserId>,
    pub preparer_id: Option<UserId>,
}

// Column widths of the `clientes` table.
const NAME_MAX: usize = 150;
const PASSPORT_MAX: usize = 50;
const EMAIL_MAX: usize = 150;
const PHONE_MAX: usize = 30;
const CHANNEL_MAX: usize = 50;

/// Trim; blank becomes `None`.
fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_text(field: &str, value: Option<&str>, max: usize) -> DomainResult<()> {
    validate::max_len(field, value, max)
}

fn check_email(value: Option<String>) -> DomainResult<Option<String>> {
    match clean(value) {
        Some(e) => {
            let e = validate::email("email", &e)?;
            check_text("email", Some(&e), EMAIL_MAX)?;
            Ok(Some(e))
        }
        None => Ok(None),
    }
}

/// `POST /clientes` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateClient {
    pub nombre_completo: String,
    #[serde(default)]
    pub pasaporte: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub canal_entrada: Option<String>,
    #[serde(default)]
    pub cita_pagada: Option<bool>,
    #[serde(default)]
    pub tramite_contratado: Option<ServiceType>,
    #[serde(default)]
    pub contrato_firmado: Option<bool>,
    #[serde(default)]
    pub pago_anticipo: Option<bool>,
    pub estado_cliente: ClientState,
    #[serde(default)]
    pub preparador_id: Option<UserId>,
}

impl CreateClient {
    /// Validate and build the record to insert.
    ///
    /// `owner` is the account the client belongs to; `creator` is the
    /// administrator/preparer performing the request and becomes the assigned
    /// preparer unless `preparador_id` names someone else.
    pub fn into_new_client(self, owner: UserId, creator: UserId) -> DomainResult<NewClient> {
        let full_name = validate::non_blank("nombre_completo", &self.nombre_completo)?;
        check_text("nombre_completo", Some(&full_name), NAME_MAX)?;
        let passport = clean(self.pasaporte);
        check_text("pasaporte", passport.as_deref(), PASSPORT_MAX)?;
        let phone = clean(self.telefono);
        check_text("telefono", phone.as_deref(), PHONE_MAX)?;
        let intake_channel = clean(self.canal_entrada);
        check_text("canal_entrada", intake_channel.as_deref(), CHANNEL_MAX)?;

        let details = ClientDetails {
            full_name: Some(full_name),
            passport,
            email: check_email(self.email)?,
            phone,
            intake_channel,
            appointment_paid: self.cita_pagada.unwrap_or(false),
            service_type: self.tramite_contratado,
            contract_signed: self.contrato_firmado.unwrap_or(false),
            advance_paid: self.pago_anticipo.unwrap_or(false),
            state: self.estado_cliente,
        };

        Ok(NewClient {
            details,
            owner_id: Some(owner),
            preparer_id: Some(self.preparador_id.unwrap_or(creator)),
        })
    }
}

/// Validated change set for [`ClientDetails`]. `Some(None)` clears a nullable
/// field; `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DetailsPatch {
    full_name: Option<Option<String>>,
    passport: Option<Option<String>>,
    email: Option<Option<String>>,
    phone: Option<Option<String>>,
    intake_channel: Option<Option<String>>,
    appointment_paid: Option<bool>,
    service_type: Option<Option<ServiceType>>,
    contract_signed: Option<bool>,
    advance_paid: Option<bool>,
    state: Option<ClientState>,
}

impl DetailsPatch {
    #[allow(clippy::too_many_arguments)]
    fn build(
        full_name: Option<Option<String>>,
        passport: Option<Option<String>>,
        email: Option<Option<String>>,
        phone: Option<Option<String>>,
        intake_channel: Option<Option<String>>,
        appointment_paid: Option<bool>,
        service_type: Option<Option<ServiceType>>,
        contract_signed: Option<bool>,
        advance_paid: Option<bool>,
        state: Option<ClientState>,
    ) -> DomainResult<Self> {
        let full_name = full_name.map(clean);
        check_text("nombre_completo", full_name.clone().flatten().as_deref(), NAME_MAX)?;
        let passport = passport.map(clean);
        check_text("pasaporte", passport.clone().flatten().as_deref(), PASSPORT_MAX)?;
        let phone = phone.map(clean);
        check_text("telefono", phone.clone().flatten().as_deref(), PHONE_MAX)?;
        let intake_channel = intake_channel.map(clean);
        check_text("canal_entrada", intake_channel.clone().flatten().as_deref(), CHANNEL_MAX)?;
        let email = email.map(check_email).transpose()?;

        Ok(Self {
            full_name,
            passport,
            email,
            phone,
            intake_channel,
            appointment_paid,
            service_type,
            contract_signed,
            advance_paid,
            state,
        })
    }

    fn apply(self, d: &mut ClientDetails) {
        if let Some(v) = self.full_name {
            d.full_name = v;
        }
        if let Some(v) = self.passport {
            d.passport = v;
        }
        if let Some(v) = self.email {
            d.email = v;
        }
        if let Some(v) = self.phone {
            d.phone = v;
        }
        if let Some(v) = self.intake_channel {
            d.intake_channel = v;
        }
        if let Some(v) = self.appointment_paid {
            d.appointment_paid = v;
        }
        if let Some(v) = self.service_type {
            d.service_type = v;
        }
        if let Some(v) = self.contract_signed {
            d.contract_signed = v;
        }
        if let Some(v) = self.advance_paid {
            d.advance_paid = v;
        }
        if let Some(v) = self.state {
            d.state = v;
        }
    }
}

/// `PUT /clientes/:id` body (administrators and preparers).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateClient {
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub nombre_completo: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub pasaporte: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub telefono: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub canal_entrada: Option<Option<String>>,
    #[serde(default)]
    pub cita_pagada: Option<bool>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub tramite_contratado: Option<Option<ServiceType>>,
    #[serde(default)]
    pub contrato_firmado: Option<bool>,
    #[serde(default)]
    pub pago_anticipo: Option<bool>,
    #[serde(default)]
    pub estado_cliente: Option<ClientState>,
    /// `null` unassigns the preparer.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub preparador_id: Option<Option<UserId>>,
}

/// `PUT /clientes/mi-perfil` body. Same as [`UpdateClient`] without the
/// preparer assignment, which a client may not change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOwnProfile {
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub nombre_completo: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub pasaporte: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub telefono: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub canal_entrada: Option<Option<String>>,
    #[serde(default)]
    pub cita_pagada: Option<bool>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub tramite_contratado: Option<Option<ServiceType>>,
    #[serde(default)]
    pub contrato_firmado: Option<bool>,
    #[serde(default)]
    pub pago_anticipo: Option<bool>,
    #[serde(default)]
    pub estado_cliente: Option<ClientState>,
}

impl UpdateClient {
    /// Preparer change requested by this update, if any.
    pub fn preparer_change(&self) -> Option<Option<UserId>> {
        self.preparador_id
    }

    /// Validate and apply to `client`. The owning user is never touched.
    pub fn apply_to(self, client: &mut Client, now: DateTime<Utc>) -> DomainResult<()> {
        let patch = DetailsPatch::build(
            self.nombre_completo,
            self.pasaporte,
            self.email,
            self.telefono,
            self.canal_entrada,
            self.cita_pagada,
            self.tramite_contratado,
            self.contrato_firmado,
            self.pago_anticipo,
            self.estado_cliente,
        )?;
        patch.apply(&mut client.details);
        if let Some(preparer) = self.preparador_id {
            client.preparer_id = preparer;
        }
        client.updated_at = now;
        Ok(())
    }
}

impl UpdateOwnProfile {
    fn into_patch(self) -> DomainResult<DetailsPatch> {
        DetailsPatch::build(
            self.nombre_completo,
            self.pasaporte,
            self.email,
            self.telefono,
            self.canal_entrada,
            self.cita_pagada,
            self.tramite_contratado,
            self.contrato_firmado,
            self.pago_anticipo,
            self.estado_cliente,
        )
    }

    /// Validate and apply to the caller's existing profile.
    pub fn apply_to(self, client: &mut Client, now: DateTime<Utc>) -> DomainResult<()> {
        self.into_patch()?.apply(&mut client.details);
        client.updated_at = now;
        Ok(())
    }

    /// Validate and build a first profile owned by `owner`, with no preparer.
    pub fn into_new_client(self, owner: UserId) -> DomainResult<NewClient> {
        let mut details = ClientDetails::default();
        self.into_patch()?.apply(&mut details);
        Ok(NewClient {
            details,
            owner_id: Some(owner),
            preparer_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctrack_core::DomainError;
    use serde_json::json;

    fn client(owner: Option<i64>, preparer: Option<i64>) -> Client {
        let now = Utc::now();
        Client {
            id: ClientId::new(1),
            details: ClientDetails {
                full_name: Some("María Torres".into()),
                ..ClientDetails::default()
            },
            owner_id: owner.map(UserId::new),
            preparer_id: preparer.map(UserId::new),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn creator_becomes_default_preparer() {
        let body: CreateClient =
            serde_json::from_value(json!({"nombre_completo": "Carlos", "estado_cliente": "nuevo"})).unwrap();
        let new = body.into_new_client(UserId::new(2), UserId::new(2)).unwrap();
        assert_eq!(new.owner_id, Some(UserId::new(2)));
        assert_eq!(new.preparer_id, Some(UserId::new(2)));
        assert!(!new.details.appointment_paid);
    }

    #[test]
    fn explicit_preparer_wins() {
        let body: CreateClient = serde_json::from_value(json!({
            "nombre_completo": "Carlos",
            "estado_cliente": "evaluando",
            "preparador_id": 9,
        }))
        .unwrap();
        let new = body.into_new_client(UserId::new(5), UserId::new(2)).unwrap();
        assert_eq!(new.owner_id, Some(UserId::new(5)));
        assert_eq!(new.preparer_id, Some(UserId::new(9)));
        assert_eq!(new.details.state, ClientState::Evaluating);
    }

    #[test]
    fn create_validates_lengths_email_and_enums() {
        let long = "x".repeat(31);
        let body: CreateClient = serde_json::from_value(json!({
            "nombre_completo": "Carlos", "estado_cliente": "nuevo", "telefono": long,
        }))
        .unwrap();
        assert!(matches!(body.into_new_client(UserId::new(1), UserId::new(1)), Err(DomainError::Validation(_))));

        let body: CreateClient = serde_json::from_value(json!({
            "nombre_completo": "Carlos", "estado_cliente": "nuevo", "email": "nope",
        }))
        .unwrap();
        assert!(body.into_new_client(UserId::new(1), UserId::new(1)).is_err());

        assert!(serde_json::from_value::<CreateClient>(json!({
            "nombre_completo": "Carlos", "estado_cliente": "archivado",
        }))
        .is_err());
        assert!(serde_json::from_value::<CreateClient>(json!({"nombre_completo": "Carlos"})).is_err());
    }

    #[test]
    fn reassigning_preparer_keeps_owner() {
        let mut c = client(Some(7), Some(2));
        let patch: UpdateClient = serde_json::from_value(json!({"preparador_id": 3})).unwrap();
        patch.apply_to(&mut c, Utc::now()).unwrap();
        assert_eq!(c.preparer_id, Some(UserId::new(3)));
        assert_eq!(c.owner_id, Some(UserId::new(7)));

        let unassign: UpdateClient = serde_json::from_value(json!({"preparador_id": null})).unwrap();
        unassign.apply_to(&mut c, Utc::now()).unwrap();
        assert_eq!(c.preparer_id, None);
        assert_eq!(c.owner_id, Some(UserId::new(7)));
    }

    #[test]
    fn any_state_may_follow_any_other() {
        let mut c = client(None, None);
        for state in ["cerrado", "nuevo", "activo", "evaluando", "nuevo"] {
            let patch: UpdateClient = serde_json::from_value(json!({"estado_cliente": state})).unwrap();
            patch.apply_to(&mut c, Utc::now()).unwrap();
            assert_eq!(c.details.state.as_str(), state);
        }
    }

    #[test]
    fn null_clears_service_type() {
        let mut c = client(None, None);
        c.details.service_type = Some(ServiceType::Renewal);
        let patch: UpdateClient = serde_json::from_value(json!({"tramite_contratado": null})).unwrap();
        patch.apply_to(&mut c, Utc::now()).unwrap();
        assert_eq!(c.details.service_type, None);
    }

    #[test]
    fn own_profile_cannot_carry_preparer() {
        assert!(serde_json::from_value::<UpdateOwnProfile>(json!({"preparador_id": 3})).is_err());
    }

    #[test]
    fn own_profile_creates_unassigned_profile() {
        let body: UpdateOwnProfile =
            serde_json::from_value(json!({"nombre_completo": "  Lucía  ", "cita_pagada": true})).unwrap();
        let new = body.into_new_client(UserId::new(7)).unwrap();
        assert_eq!(new.owner_id, Some(UserId::new(7)));
        assert_eq!(new.preparer_id, None);
        assert_eq!(new.details.full_name.as_deref(), Some("Lucía"));
        assert!(new.details.appointment_paid);
        assert_eq!(new.details.state, ClientState::New);
    }

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_value(client(Some(7), None)).unwrap();
        assert_eq!(json["nombre_completo"], "María Torres");
        assert_eq!(json["estado_cliente"], "nuevo");
        assert_eq!(json["usuario_id"], 7);
        assert!(json["preparador_id"].is_null());
    }
}
