//! Practice Billing - payment reconciliation for a practice-management SaaS
//!
//! Issues gateway charges for financial-flow entries, reconciles the
//! gateway's payment webhooks into flow and charge status, and derives each
//! company's subscription state from its billing timeline.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
