//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | PostgreSQL code | StoreError |
//! |-----------------|------------|
//! | `23505` unique violation | `Unique` |
//! | `23503` foreign key violation | `ForeignKey` |
//! | column decode failures | `Decode` |
//! | anything else | `Database` |
//!
//! Contract search folds accents with the `unaccent` extension when the
//! database provides it; otherwise the search is only case-insensitive.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::instrument;

use doctrack_auth::{ContractScope, NewUser, Role, User};
use doctrack_clients::{Client, ClientDetails, ClientState, NewClient, ServiceType};
use doctrack_contracts::query::like_pattern;
use doctrack_contracts::{Contract, ContractPage, ContractQuery, ContractRecord, NewContract, SignedFilter};
use doctrack_core::{ClientId, ContractId, UserId};

use super::{ClientStore, ContractStore, StoreError, StoreResult, UserStore, map_sqlx_error};

const USER_COLUMNS: &str = "id, nombre_completo, email, telefono, password_hash, rol, foto_url, \
     token, activo, ultimo_acceso, creado_en, actualizado_en";

/// Client columns, aliased so they can share a row with contract columns.
const CLIENT_COLUMNS: &str = "c.id AS cl_id, c.nombre_completo AS cl_nombre_completo, \
     c.pasaporte AS cl_pasaporte, c.email AS cl_email, c.telefono AS cl_telefono, \
     c.canal_entrada AS cl_canal_entrada, c.cita_pagada AS cl_cita_pagada, \
     c.tramite_contratado AS cl_tramite_contratado, c.contrato_firmado AS cl_contrato_firmado, \
     c.pago_anticipo AS cl_pago_anticipo, c.estado_cliente AS cl_estado_cliente, \
     c.usuario_id AS cl_usuario_id, c.preparador_id AS cl_preparador_id, \
     c.creado_en AS cl_creado_en, c.actualizado_en AS cl_actualizado_en";

const CONTRACT_COLUMNS: &str = "ct.id, ct.cliente_id, ct.fecha_firma, ct.monto_total, ct.firma, ct.creado_en";

/// Postgres implementation of every store trait.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
    unaccent: bool,
}

impl PostgresStore {
    /// Open a pool, run the embedded migrations and probe for `unaccent`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: PgPool) -> StoreResult<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(format!("migrate: {e}")))?;

        let unaccent = detect_unaccent(&pool).await;
        if !unaccent {
            tracing::warn!("unaccent extension unavailable; contract search is accent-sensitive");
        }
        Ok(Self {
            pool: Arc::new(pool),
            unaccent,
        })
    }

    fn contract_filter(&self) -> String {
        let fold = |expr: &str| {
            if self.unaccent {
                format!("unaccent({expr})")
            } else {
                expr.to_string()
            }
        };
        format!(
            r#"
            WHERE ($1::bigint IS NULL OR c.usuario_id = $1)
                AND ($2::bigint IS NULL OR ct.cliente_id = $2)
                AND ($3::boolean IS NULL OR (ct.firma IS NOT NULL) = $3)
                AND ($4::date IS NULL OR ct.fecha_firma >= $4)
                AND ($5::date IS NULL OR ct.fecha_firma <= $5)
                AND ($6::numeric IS NULL OR ct.monto_total >= $6)
                AND ($7::numeric IS NULL OR ct.monto_total <= $7)
                AND ($8::text IS NULL
                     OR {name} ILIKE {pattern} ESCAPE '\'
                     OR {email} ILIKE {pattern} ESCAPE '\')
            "#,
            name = fold("c.nombre_completo"),
            email = fold("c.email"),
            pattern = fold("$8"),
        )
    }
}

async fn detect_unaccent(pool: &PgPool) -> bool {
    if let Err(e) = sqlx::query("CREATE EXTENSION IF NOT EXISTS unaccent").execute(pool).await {
        tracing::debug!(error = %e, "could not create unaccent extension");
    }
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM pg_extension WHERE extname = 'unaccent')")
        .fetch_one(pool)
        .await
        .unwrap_or(false)
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| map_sqlx_error("decode", e))
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let rol: String = col(row, "rol")?;
    let role = rol
        .parse::<Role>()
        .map_err(|_| StoreError::Decode(format!("unknown rol '{rol}'")))?;
    Ok(User {
        id: UserId::new(col(row, "id")?),
        full_name: col(row, "nombre_completo")?,
        email: col(row, "email")?,
        phone: col(row, "telefono")?,
        password_hash: col(row, "password_hash")?,
        role,
        photo_url: col(row, "foto_url")?,
        session_token: col(row, "token")?,
        active: col(row, "activo")?,
        last_access: col(row, "ultimo_acceso")?,
        created_at: col(row, "creado_en")?,
        updated_at: col(row, "actualizado_en")?,
    })
}

fn client_from_row(row: &PgRow) -> StoreResult<Client> {
    let service: Option<String> = col(row, "cl_tramite_contratado")?;
    let service_type = match service {
        Some(s) => Some(
            ServiceType::parse(&s).ok_or_else(|| StoreError::Decode(format!("unknown tramite_contratado '{s}'")))?,
        ),
        None => None,
    };
    let state: String = col(row, "cl_estado_cliente")?;
    let state = ClientState::parse(&state)
        .ok_or_else(|| StoreError::Decode(format!("unknown estado_cliente '{state}'")))?;
    let owner: Option<i64> = col(row, "cl_usuario_id")?;
    let preparer: Option<i64> = col(row, "cl_preparador_id")?;

    Ok(Client {
        id: ClientId::new(col(row, "cl_id")?),
        details: ClientDetails {
            full_name: col(row, "cl_nombre_completo")?,
            passport: col(row, "cl_pasaporte")?,
            email: col(row, "cl_email")?,
            phone: col(row, "cl_telefono")?,
            intake_channel: col(row, "cl_canal_entrada")?,
            appointment_paid: col(row, "cl_cita_pagada")?,
            service_type,
            contract_signed: col(row, "cl_contrato_firmado")?,
            advance_paid: col(row, "cl_pago_anticipo")?,
            state,
        },
        owner_id: owner.map(UserId::new),
        preparer_id: preparer.map(UserId::new),
        created_at: col(row, "cl_creado_en")?,
        updated_at: col(row, "cl_actualizado_en")?,
    })
}

fn contract_from_row(row: &PgRow) -> StoreResult<Contract> {
    Ok(Contract {
        id: ContractId::new(col(row, "id")?),
        client_id: ClientId::new(col(row, "cliente_id")?),
        signed_on: col::<Option<NaiveDate>>(row, "fecha_firma")?,
        total_amount: col::<Option<Decimal>>(row, "monto_total")?,
        signature: col(row, "firma")?,
        created_at: col::<DateTime<Utc>>(row, "creado_en")?,
    })
}

fn record_from_row(row: &PgRow) -> StoreResult<ContractRecord> {
    Ok(ContractRecord {
        contract: contract_from_row(row)?,
        client: client_from_row(row)?,
    })
}

fn bind_contract_filters<'q>(
    q: Query<'q, Postgres, PgArguments>,
    query: &ContractQuery,
    scope: &ContractScope,
) -> Query<'q, Postgres, PgArguments> {
    let signed = query.signed.map(|s| s == SignedFilter::Signed);
    q.bind(scope.owner_filter().map(UserId::get))
        .bind(query.client_id.map(ClientId::get))
        .bind(signed)
        .bind(query.from)
        .bind(query.to)
        .bind(query.min_amount)
        .bind(query.max_amount)
        .bind(query.search.as_deref().map(like_pattern))
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> StoreResult<User> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO usuarios (
                nombre_completo, email, telefono, password_hash, rol, foto_url,
                activo, creado_en, actualizado_en
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.photo_url)
        .bind(user.active)
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        user_from_row(&row)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        sqlx::query(&format!("SELECT {USER_COLUMNS} FROM usuarios WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn get_users(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM usuarios WHERE id = ANY($1)"))
            .bind(raw)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_users", e))?;
        rows.iter().map(user_from_row).collect()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query(&format!("SELECT {USER_COLUMNS} FROM usuarios WHERE email = $1"))
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM usuarios ORDER BY nombre_completo ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;
        rows.iter().map(user_from_row).collect()
    }

    async fn search_users(&self, role: Role, text: Option<&str>, limit: u32) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM usuarios
            WHERE rol = $1
                AND ($2::text IS NULL
                     OR nombre_completo ILIKE $2 ESCAPE '\'
                     OR email ILIKE $2 ESCAPE '\')
            ORDER BY nombre_completo ASC, id ASC
            LIMIT $3
            "#
        ))
        .bind(role.as_str())
        .bind(text.map(like_pattern))
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_users", e))?;
        rows.iter().map(user_from_row).collect()
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE usuarios SET
                nombre_completo = $2,
                email = $3,
                telefono = $4,
                password_hash = $5,
                rol = $6,
                foto_url = $7,
                activo = $8,
                actualizado_en = $9
            WHERE id = $1
            "#,
        )
        .bind(user.id.get())
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.photo_url)
        .bind(user.active)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_user", e))?;
        Ok(())
    }

    #[instrument(skip(self, token), fields(user_id = %id), err)]
    async fn set_session(
        &self,
        id: UserId,
        token: Option<&str>,
        accessed_at: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE usuarios SET token = $2, ultimo_acceso = COALESCE($3, ultimo_acceso) WHERE id = $1",
        )
        .bind(id.get())
        .bind(token)
        .bind(accessed_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_session", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM usuarios WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ClientStore for PostgresStore {
    async fn insert_client(&self, client: NewClient, now: DateTime<Utc>) -> StoreResult<Client> {
        let d = &client.details;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO clientes AS c (
                nombre_completo, pasaporte, email, telefono, canal_entrada,
                cita_pagada, tramite_contratado, contrato_firmado, pago_anticipo,
                estado_cliente, usuario_id, preparador_id, creado_en, actualizado_en
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(&d.full_name)
        .bind(&d.passport)
        .bind(&d.email)
        .bind(&d.phone)
        .bind(&d.intake_channel)
        .bind(d.appointment_paid)
        .bind(d.service_type.map(|s| s.as_str()))
        .bind(d.contract_signed)
        .bind(d.advance_paid)
        .bind(d.state.as_str())
        .bind(client.owner_id.map(UserId::get))
        .bind(client.preparer_id.map(UserId::get))
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_client", e))?;
        client_from_row(&row)
    }

    async fn get_client(&self, id: ClientId) -> StoreResult<Option<Client>> {
        sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clientes c WHERE c.id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_client", e))?
            .as_ref()
            .map(client_from_row)
            .transpose()
    }

    async fn find_client_by_owner(&self, owner: UserId) -> StoreResult<Option<Client>> {
        sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clientes c WHERE c.usuario_id = $1 ORDER BY c.id ASC LIMIT 1"
        ))
        .bind(owner.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_client_by_owner", e))?
        .as_ref()
        .map(client_from_row)
        .transpose()
    }

    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clientes c ORDER BY c.creado_en DESC, c.id DESC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_clients", e))?;
        rows.iter().map(client_from_row).collect()
    }

    async fn list_clients_by_preparer(&self, preparer: UserId) -> StoreResult<Vec<Client>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CLIENT_COLUMNS}
            FROM clientes c
            WHERE c.preparador_id = $1
            ORDER BY c.creado_en DESC, c.id DESC
            "#
        ))
        .bind(preparer.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_clients_by_preparer", e))?;
        rows.iter().map(client_from_row).collect()
    }

    async fn save_client(&self, client: &Client) -> StoreResult<()> {
        let d = &client.details;
        sqlx::query(
            r#"
            UPDATE clientes SET
                nombre_completo = $2,
                pasaporte = $3,
                email = $4,
                telefono = $5,
                canal_entrada = $6,
                cita_pagada = $7,
                tramite_contratado = $8,
                contrato_firmado = $9,
                pago_anticipo = $10,
                estado_cliente = $11,
                usuario_id = $12,
                preparador_id = $13,
                actualizado_en = $14
            WHERE id = $1
            "#,
        )
        .bind(client.id.get())
        .bind(&d.full_name)
        .bind(&d.passport)
        .bind(&d.email)
        .bind(&d.phone)
        .bind(&d.intake_channel)
        .bind(d.appointment_paid)
        .bind(d.service_type.map(|s| s.as_str()))
        .bind(d.contract_signed)
        .bind(d.advance_paid)
        .bind(d.state.as_str())
        .bind(client.owner_id.map(UserId::get))
        .bind(client.preparer_id.map(UserId::get))
        .bind(client.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_client", e))?;
        Ok(())
    }

    async fn delete_client(&self, id: ClientId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM clientes WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_client", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ContractStore for PostgresStore {
    async fn insert_contract(&self, contract: NewContract, now: DateTime<Utc>) -> StoreResult<Contract> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO contratos AS ct (cliente_id, fecha_firma, monto_total, firma, creado_en)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract.client_id.get())
        .bind(contract.signed_on)
        .bind(contract.total_amount)
        .bind(&contract.signature)
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_contract", e))?;
        contract_from_row(&row)
    }

    async fn get_contract(&self, id: ContractId) -> StoreResult<Option<ContractRecord>> {
        sqlx::query(&format!(
            r#"
            SELECT {CONTRACT_COLUMNS}, {CLIENT_COLUMNS}
            FROM contratos ct
            JOIN clientes c ON c.id = ct.cliente_id
            WHERE ct.id = $1
            "#
        ))
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_contract", e))?
        .as_ref()
        .map(record_from_row)
        .transpose()
    }

    #[instrument(skip(self, query), fields(owner = ?scope.owner_filter()), err)]
    async fn query_contracts(
        &self,
        query: &ContractQuery,
        scope: &ContractScope,
    ) -> StoreResult<ContractPage<ContractRecord>> {
        let filter = self.contract_filter();

        let count_sql = format!(
            "SELECT COUNT(*) AS total FROM contratos ct JOIN clientes c ON c.id = ct.cliente_id {filter}"
        );
        let count_row = bind_contract_filters(sqlx::query(&count_sql), query, scope)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_contracts", e))?;
        let total: i64 = col(&count_row, "total")?;

        let dir = query.dir.keyword();
        let data_sql = format!(
            r#"
            SELECT {CONTRACT_COLUMNS}, {CLIENT_COLUMNS}
            FROM contratos ct
            JOIN clientes c ON c.id = ct.cliente_id
            {filter}
            ORDER BY ct.{order} {dir}, ct.id {dir}
            LIMIT $9 OFFSET $10
            "#,
            order = query.order.column(),
        );
        let rows = bind_contract_filters(sqlx::query(&data_sql), query, scope)
            .bind(i64::from(query.limit))
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("query_contracts", e))?;

        Ok(ContractPage {
            page: query.page,
            limit: query.limit,
            total: u64::try_from(total).unwrap_or(0),
            data: rows.iter().map(record_from_row).collect::<StoreResult<_>>()?,
        })
    }

    async fn save_contract(&self, contract: &Contract) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE contratos SET
                cliente_id = $2,
                fecha_firma = $3,
                monto_total = $4,
                firma = $5
            WHERE id = $1
            "#,
        )
        .bind(contract.id.get())
        .bind(contract.client_id.get())
        .bind(contract.signed_on)
        .bind(contract.total_amount)
        .bind(&contract.signature)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_contract", e))?;
        Ok(())
    }

    async fn delete_contract(&self, id: ContractId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM contratos WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_contract", e))?;
        Ok(result.rows_affected() > 0)
    }
}
