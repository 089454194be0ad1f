//! In-memory adapters.
//!
//! Back the storage ports with process memory for unit and integration
//! tests; no database required.

mod billing_store;

pub use billing_store::InMemoryBillingStore;
