//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the billing domain to external systems:
//! - `asaas` - payment gateway REST client (and an in-memory mock)
//! - `postgres` - storage ports over sqlx
//! - `memory` - in-memory storage for tests and local runs
//! - `http` - axum routes

pub mod asaas;
pub mod http;
pub mod memory;
pub mod postgres;
