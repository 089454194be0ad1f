//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers change billing state; query handlers only read it.

pub mod handlers;

pub use handlers::billing;
