//! Infrastructure layer: configuration and persistence.

pub mod config;
pub mod store;

pub use config::{AppConfig, BootstrapAdmin, ConfigError};
pub use store::{ClientStore, ContractStore, StoreError, StoreResult, UserStore};
