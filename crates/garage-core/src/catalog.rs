//! Read-only fault catalog contract.
//!
//! The quote engine prices faults through this narrow interface; the
//! SQLite store implements it next to `GarageStore`.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::types::Fault;

pub trait FaultCatalog {
    /// Look up one fault with its group name resolved.
    fn fault_by_id(&self, id: &Uuid) -> Result<Option<Fault>>;

    /// Current global labor rate per hour.
    fn current_hourly_rate(&self) -> Result<Decimal>;

    /// Current VAT rate as a fraction.
    fn current_vat_rate(&self) -> Result<Decimal>;
}
