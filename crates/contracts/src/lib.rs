//! Contracts: the entity, its write rules and the list query protocol.

pub mod contract;
pub mod query;

pub use contract::{Contract, ContractRecord, CreateContract, NewContract, UpdateContract};
pub use query::{ContractListParams, ContractPage, ContractQuery, SignedFilter, SortDir, SortField};
