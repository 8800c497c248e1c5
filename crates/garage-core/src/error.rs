//! Error types for garage core operations.
//!
//! Business-rule violations are surfaced directly to the caller and never
//! retried; only storage contention on the atomic numbering/booking sections
//! is retried internally before degrading to [`GarageError::Conflict`].

use thiserror::Error;

use crate::storage::types::CaseStatus;

/// Result type alias for garage operations.
pub type Result<T> = std::result::Result<T, GarageError>;

/// Core error type for garage operations.
#[derive(Debug, Error)]
pub enum GarageError {
    /// The requested status change is not an edge of the workflow table
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: CaseStatus, to: CaseStatus },

    /// The operation is not permitted while the case is in its current status
    #[error("operation not permitted while case is {0}")]
    InvalidState(CaseStatus),

    /// Quote generation requires at least one selected fault
    #[error("case has no selected faults")]
    NoFaultsSelected,

    /// A case carries at most one quote
    #[error("a quote already exists for this case")]
    QuoteAlreadyExists,

    /// Line edits are rejected once the manager validated the quote
    #[error("quote is validated; its lines are locked")]
    QuoteLocked,

    /// A quote cannot be validated without lines
    #[error("quote has no lines")]
    EmptyQuote,

    /// Accept/refuse require a manager-validated quote
    #[error("quote has not been issued yet")]
    NotYetIssued,

    /// The client already accepted or refused this quote
    #[error("quote has already been decided")]
    AlreadyDecided,

    /// The quote validity date has passed
    #[error("quote validity date has passed")]
    Expired,

    /// Another active appointment occupies the same date and start time
    #[error("slot is already booked")]
    SlotTaken,

    /// Appointments must be booked at least one day ahead
    #[error("appointment date must be at least tomorrow")]
    NotAdvanceEnough,

    /// The cancellation/modification window has closed
    #[error("appointment can no longer be changed")]
    TooLateToChange,

    /// A case carries at most one invoice
    #[error("an invoice already exists for this case")]
    InvoiceAlreadyExists,

    /// Invoicing requires a quote
    #[error("case has no quote")]
    NoQuote,

    /// Invoicing requires an accepted quote
    #[error("quote has not been accepted")]
    QuoteNotAccepted,

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage contention persisted through the bounded retries
    #[error("storage conflict: concurrent writers, retries exhausted")]
    Conflict,

    /// Invalid input data
    #[error("validation error: {0}")]
    Validation(String),

    /// Unexpected storage failure, fatal to the current operation
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for GarageError {
    fn from(err: rusqlite::Error) -> Self {
        // Busy/locked is contention, not corruption; the store's atomic
        // sections retry it before it reaches a caller.
        if let rusqlite::Error::SqliteFailure(e, _) = &err {
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
            {
                return GarageError::Conflict;
            }
        }
        GarageError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for GarageError {
    fn from(err: std::io::Error) -> Self {
        GarageError::Storage(err.to_string())
    }
}
