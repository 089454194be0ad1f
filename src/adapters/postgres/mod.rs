//! PostgreSQL adapters - Database implementations for the storage ports.
//!
//! - `PostgresBillingStore` - charges, financial flows, company subscriptions
//!   and atomic webhook reconciliation
//! - `PostgresCredentialStore` - gateway credentials (read-only)
//! - `SchemaCache` - company column discovery for tables the engine does not own

mod billing_store;
mod credential_store;
mod schema_cache;

pub use billing_store::PostgresBillingStore;
pub use credential_store::PostgresCredentialStore;
pub use schema_cache::SchemaCache;
