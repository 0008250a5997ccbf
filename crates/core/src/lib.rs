//! `doctrack-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! numeric identifiers, the `Entity` trait, the error taxonomy every other
//! crate reports through, and the input checks request types share.

pub mod entity;
pub mod error;
pub mod id;
pub mod nullable;
pub mod validate;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ClientId, ContractId, UserId};
