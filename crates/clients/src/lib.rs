//! Clients domain module (client profiles handled by the business).
//!
//! This crate contains the client entity and the rules for creating and
//! updating it, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage).

pub mod client;

pub use client::{
    Client, ClientDetails, ClientState, CreateClient, NewClient, ServiceType, UpdateClient,
    UpdateOwnProfile,
};
