//! # Garage Core
//!
//! Workflow engine for a vehicle-repair workshop: case lifecycle, quote
//! calculation and numbering, appointment-slot allocation, and invoice
//! generation, over a SQLite-backed store.
//!
//! ## Architecture
//!
//! - **storage**: persistence contract and the SQLite engine
//! - **workflow**: the case state machine and its audit trail
//! - **quote**: quote generation, totals, validate/accept/refuse
//! - **schedule**: slot availability and appointment booking rules
//! - **billing**: invoice derivation and payments
//! - **numbering**: yearly document-number formatting
//! - **catalog**: read-only fault tariff contract
//! - **notify**: fire-and-forget workflow event dispatch

pub mod billing;
pub mod catalog;
pub mod config;
pub mod error;
pub mod notify;
pub mod numbering;
pub mod quote;
pub mod schedule;
pub mod storage;
pub mod workflow;

pub use billing::InvoiceGenerator;
pub use catalog::FaultCatalog;
pub use config::GarageConfig;
pub use error::{GarageError, Result};
pub use notify::{LogNotifier, Notifier, NullNotifier};
pub use quote::QuoteEngine;
pub use schedule::AppointmentScheduler;
pub use storage::{GarageStore, SqliteStore};
pub use workflow::CaseWorkflow;

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
