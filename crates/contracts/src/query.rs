//! Contract list query: raw parameters, their validated form, and the
//! in-process evaluation used by the in-memory store.
//!
//! The Postgres store evaluates the same [`ContractQuery`] in SQL; both must
//! agree on filtering, ordering and paging.

use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use doctrack_core::{ClientId, DomainError, DomainResult};

use crate::contract::ContractRecord;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;
/// Page size of `GET /contratos/cliente/:clienteId`.
pub const BY_CLIENT_LIMIT: u32 = 50;

/// Query string of `GET /contratos`, as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub cliente_id: Option<String>,
    pub firmado: Option<String>,
    pub desde: Option<String>,
    pub hasta: Option<String>,
    pub q: Option<String>,
    pub monto_min: Option<String>,
    pub monto_max: Option<String>,
    pub order: Option<String>,
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedFilter {
    Signed,
    Unsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    SignedOn,
    TotalAmount,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "creado_en",
            SortField::SignedOn => "fecha_firma",
            SortField::TotalAmount => "monto_total",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Validated list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractQuery {
    pub page: u32,
    pub limit: u32,
    pub client_id: Option<ClientId>,
    pub signed: Option<SignedFilter>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Trimmed free text; never empty.
    pub search: Option<String>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub order: SortField,
    pub dir: SortDir,
}

impl Default for ContractQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            client_id: None,
            signed: None,
            from: None,
            to: None,
            search: None,
            min_amount: None,
            max_amount: None,
            order: SortField::default(),
            dir: SortDir::default(),
        }
    }
}

/// Blank query-string values count as absent.
fn present(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn positive(field: &str, raw: Option<String>, default: u32) -> DomainResult<u32> {
    match present(raw) {
        None => Ok(default),
        Some(v) => match v.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(DomainError::validation(format!("{field} debe ser un entero positivo"))),
        },
    }
}

fn date(field: &str, raw: Option<String>) -> DomainResult<Option<NaiveDate>> {
    present(raw)
        .map(|v| {
            NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .map_err(|_| DomainError::validation(format!("{field} debe tener formato YYYY-MM-DD")))
        })
        .transpose()
}

fn amount(field: &str, raw: Option<String>) -> DomainResult<Option<Decimal>> {
    present(raw)
        .map(|v| {
            v.parse::<Decimal>()
                .map_err(|_| DomainError::validation(format!("{field} debe ser numérico")))
        })
        .transpose()
}

impl TryFrom<ContractListParams> for ContractQuery {
    type Error = DomainError;

    fn try_from(p: ContractListParams) -> DomainResult<Self> {
        let page = positive("page", p.page, DEFAULT_PAGE)?;
        let limit = positive("limit", p.limit, DEFAULT_LIMIT)?.min(MAX_LIMIT);

        let client_id = present(p.cliente_id)
            .map(|v| v.parse::<ClientId>())
            .transpose()
            .map_err(|_| DomainError::validation("cliente_id debe ser un entero positivo"))?;

        let signed = match present(p.firmado).map(|v| v.to_lowercase()).as_deref() {
            None => None,
            Some("si") => Some(SignedFilter::Signed),
            Some("no") => Some(SignedFilter::Unsigned),
            Some(_) => return Err(DomainError::validation("firmado debe ser 'si' o 'no'")),
        };

        let order = match present(p.order).as_deref() {
            None | Some("creado_en") => SortField::CreatedAt,
            Some("fecha_firma") => SortField::SignedOn,
            Some("monto_total") => SortField::TotalAmount,
            Some(_) => {
                return Err(DomainError::validation(
                    "order debe ser creado_en, fecha_firma o monto_total",
                ));
            }
        };

        let dir = match present(p.dir).map(|v| v.to_uppercase()).as_deref() {
            None | Some("DESC") => SortDir::Desc,
            Some("ASC") => SortDir::Asc,
            Some(_) => return Err(DomainError::validation("dir debe ser ASC o DESC")),
        };

        Ok(Self {
            page,
            limit,
            client_id,
            signed,
            from: date("desde", p.desde)?,
            to: date("hasta", p.hasta)?,
            search: present(p.q),
            min_amount: amount("monto_min", p.monto_min)?,
            max_amount: amount("monto_max", p.monto_max)?,
            order,
            dir,
        })
    }
}

impl ContractQuery {
    /// `GET /contratos/cliente/:clienteId`.
    pub fn for_client(client_id: ClientId) -> Self {
        Self {
            client_id: Some(client_id),
            limit: BY_CLIENT_LIMIT,
            ..Self::default()
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Filter predicate, excluding scope.
    pub fn matches(&self, record: &ContractRecord) -> bool {
        let c = &record.contract;
        if self.client_id.is_some_and(|id| id != c.client_id) {
            return false;
        }
        match self.signed {
            Some(SignedFilter::Signed) if !c.is_signed() => return false,
            Some(SignedFilter::Unsigned) if c.is_signed() => return false,
            _ => {}
        }
        // SQL comparisons against NULL never hold.
        if let Some(from) = self.from {
            if !c.signed_on.is_some_and(|d| d >= from) {
                return false;
            }
        }
        if let Some(to) = self.to {
            if !c.signed_on.is_some_and(|d| d <= to) {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if !c.total_amount.is_some_and(|a| a >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if !c.total_amount.is_some_and(|a| a <= max) {
                return false;
            }
        }
        if let Some(q) = &self.search {
            let needle = fold_search_text(q);
            let details = &record.client.details;
            let hit = [details.full_name.as_deref(), details.email.as_deref()]
                .into_iter()
                .flatten()
                .any(|field| fold_search_text(field).contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }

    /// Sort by the requested field, nulls largest, ties by id.
    pub fn sort(&self, records: &mut [ContractRecord]) {
        let order = self.order;
        records.sort_by(|a, b| {
            let (a, b) = (&a.contract, &b.contract);
            let by_key = match order {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::SignedOn => nulls_last(a.signed_on, b.signed_on),
                SortField::TotalAmount => nulls_last(a.total_amount, b.total_amount),
            };
            let ord = by_key.then(a.id.cmp(&b.id));
            match self.dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        });
    }

    /// Filter, sort and page `records`.
    pub fn evaluate(&self, records: Vec<ContractRecord>) -> ContractPage<ContractRecord> {
        let mut matched: Vec<ContractRecord> = records.into_iter().filter(|r| self.matches(r)).collect();
        self.sort(&mut matched);
        let total = matched.len() as u64;
        let data = matched
            .into_iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.limit as usize)
            .collect();
        ContractPage {
            page: self.page,
            limit: self.limit,
            total,
            data,
        }
    }
}

fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Case and accent folding for search: lowercase, NFD, drop combining marks.
pub fn fold_search_text(s: &str) -> String {
    s.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// `%q%` with LIKE metacharacters escaped by `\`.
pub fn like_pattern(q: &str) -> String {
    let mut out = String::with_capacity(q.len() + 2);
    out.push('%');
    for ch in q.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractPage<T> {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub data: Vec<T>,
}

impl<T> ContractPage<T> {
    pub fn empty(query: &ContractQuery) -> Self {
        Self {
            page: query.page,
            limit: query.limit,
            total: 0,
            data: Vec::new(),
        }
    }
}
