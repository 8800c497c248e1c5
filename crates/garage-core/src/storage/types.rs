//! Core data types for the storage layer.
//!
//! Monetary amounts and labor hours are `Decimal` end to end; calendar
//! values on slots and appointments are naive date/times in the workshop's
//! single normalized time zone, instants are UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GarageError, Result};

/// Repair-case lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    New,
    QuoteIssued,
    QuoteAccepted,
    QuoteRefused,
    ApptConfirmed,
    InProgress,
    Ready,
    Closed,
    Expired,
}

impl CaseStatus {
    /// Stable wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::New => "NEW",
            CaseStatus::QuoteIssued => "QUOTE_ISSUED",
            CaseStatus::QuoteAccepted => "QUOTE_ACCEPTED",
            CaseStatus::QuoteRefused => "QUOTE_REFUSED",
            CaseStatus::ApptConfirmed => "APPT_CONFIRMED",
            CaseStatus::InProgress => "IN_PROGRESS",
            CaseStatus::Ready => "READY",
            CaseStatus::Closed => "CLOSED",
            CaseStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "NEW" => Ok(CaseStatus::New),
            "QUOTE_ISSUED" => Ok(CaseStatus::QuoteIssued),
            "QUOTE_ACCEPTED" => Ok(CaseStatus::QuoteAccepted),
            "QUOTE_REFUSED" => Ok(CaseStatus::QuoteRefused),
            "APPT_CONFIRMED" => Ok(CaseStatus::ApptConfirmed),
            "IN_PROGRESS" => Ok(CaseStatus::InProgress),
            "READY" => Ok(CaseStatus::Ready),
            "CLOSED" => Ok(CaseStatus::Closed),
            "EXPIRED" => Ok(CaseStatus::Expired),
            other => Err(GarageError::Validation(format!(
                "unknown case status: {}",
                other
            ))),
        }
    }

    /// Terminal statuses permit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaseStatus::QuoteRefused | CaseStatus::Expired | CaseStatus::Closed
        )
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency declared by the client at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Low,
    Normal,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "LOW",
            Urgency::Normal => "NORMAL",
            Urgency::High => "HIGH",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "LOW" => Ok(Urgency::Low),
            "NORMAL" => Ok(Urgency::Normal),
            "HIGH" => Ok(Urgency::High),
            other => Err(GarageError::Validation(format!(
                "unknown urgency: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repair request, tracked from intake through billing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: Uuid,

    /// Opaque reference to the client record
    pub client_id: Uuid,

    /// Opaque reference to the vehicle record
    pub vehicle_id: Uuid,

    /// Free-text problem description
    pub description: String,

    pub urgency: Urgency,

    pub status: CaseStatus,

    /// Faults the client selected from the catalog
    pub fault_ids: Vec<Uuid>,

    /// Estimated completion of the repair, once known
    pub estimated_completion: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Builder for case intake.
#[derive(Debug, Clone)]
pub struct NewCase {
    pub client_id: Uuid,
    pub vehicle_id: Uuid,
    pub description: String,
    pub urgency: Urgency,
}

impl NewCase {
    pub fn new(client_id: Uuid, vehicle_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            client_id,
            vehicle_id,
            description: description.into(),
            urgency: Urgency::Normal,
        }
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }
}

/// Filter for listing cases.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub client_id: Option<Uuid>,
    pub status: Option<CaseStatus>,
    pub urgency: Option<Urgency>,
    pub limit: Option<usize>,
}

/// One immutable record of a status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusLog {
    pub id: Uuid,
    pub case_id: Uuid,
    pub old_status: CaseStatus,
    pub new_status: CaseStatus,

    /// Who performed the transition
    pub actor: String,

    pub comment: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Quote line kind: labor (hours x rate) or parts (quantity x unit price).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineKind {
    Labor,
    Parts,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::Labor => "LABOR",
            LineKind::Parts => "PARTS",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "LABOR" => Ok(LineKind::Labor),
            "PARTS" => Ok(LineKind::Parts),
            other => Err(GarageError::Validation(format!(
                "unknown line kind: {}",
                other
            ))),
        }
    }
}

/// One priced line of a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteLine {
    pub id: Uuid,
    pub kind: LineKind,
    pub description: String,

    /// Labor lines only
    pub hours: Option<Decimal>,

    /// Labor lines only
    pub hourly_rate: Option<Decimal>,

    /// Parts lines; labor lines carry quantity 1
    pub quantity: i64,

    /// Parts lines; zero on labor lines
    pub unit_price: Decimal,

    /// Derived, recomputed on every save
    pub line_total: Decimal,
}

impl QuoteLine {
    /// Labor line: hours x hourly rate.
    pub fn labor(description: impl Into<String>, hours: Decimal, hourly_rate: Decimal) -> Self {
        let mut line = Self {
            id: Uuid::new_v4(),
            kind: LineKind::Labor,
            description: description.into(),
            hours: Some(hours),
            hourly_rate: Some(hourly_rate),
            quantity: 1,
            unit_price: Decimal::ZERO,
            line_total: Decimal::ZERO,
        };
        line.recompute_total();
        line
    }

    /// Parts line: quantity x unit price.
    pub fn parts(description: impl Into<String>, quantity: i64, unit_price: Decimal) -> Self {
        let mut line = Self {
            id: Uuid::new_v4(),
            kind: LineKind::Parts,
            description: description.into(),
            hours: None,
            hourly_rate: None,
            quantity,
            unit_price,
            line_total: Decimal::ZERO,
        };
        line.recompute_total();
        line
    }

    /// Recompute the derived total from the line's own fields.
    pub fn recompute_total(&mut self) {
        self.line_total = match self.kind {
            LineKind::Labor => {
                let hours = self.hours.unwrap_or(Decimal::ZERO);
                let rate = self.hourly_rate.unwrap_or(Decimal::ZERO);
                (hours * rate).round_dp(2)
            }
            LineKind::Parts => (Decimal::from(self.quantity) * self.unit_price).round_dp(2),
        };
    }
}

/// A priced proposal derived from a case's selected faults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: Uuid,
    pub case_id: Uuid,

    /// `DEV-YYYY-NNN`, assigned once by the store
    pub quote_number: String,

    pub lines: Vec<QuoteLine>,

    pub total_labor: Decimal,
    pub total_parts: Decimal,
    pub total_pre_tax: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,

    /// Last day the client may still accept
    pub validity_date: NaiveDate,

    /// Locked for line edits once true; irreversible
    pub validated: bool,

    pub accepted: bool,
    pub refused: bool,
    pub refusal_reason: Option<String>,
    pub acceptance_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bookable time window: recurring (weekday) or specific (date), with
/// `exception` marking a closure day that suppresses all availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub id: Uuid,
    pub recurring: bool,
    pub weekday: Option<Weekday>,
    pub date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
    pub exception: bool,
    pub created_at: DateTime<Utc>,
}

/// Builder for slots; constructors enforce the shape invariants.
#[derive(Debug, Clone)]
pub struct NewSlot {
    pub recurring: bool,
    pub weekday: Option<Weekday>,
    pub date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
    pub exception: bool,
}

impl NewSlot {
    /// Weekly recurring slot bound to a weekday.
    pub fn recurring(weekday: Weekday, start: NaiveTime, end: NaiveTime) -> Result<Self> {
        check_slot_bounds(start, end)?;
        Ok(Self {
            recurring: true,
            weekday: Some(weekday),
            date: None,
            start_time: start,
            end_time: end,
            available: true,
            exception: false,
        })
    }

    /// One-off slot bound to a calendar date.
    pub fn specific(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Self> {
        check_slot_bounds(start, end)?;
        Ok(Self {
            recurring: false,
            weekday: None,
            date: Some(date),
            start_time: start,
            end_time: end,
            available: true,
            exception: false,
        })
    }

    /// Closure day (holiday); suppresses every slot on `date`.
    pub fn exception(date: NaiveDate) -> Self {
        Self {
            recurring: false,
            weekday: None,
            date: Some(date),
            start_time: NaiveTime::from_hms_opt(0, 0, 0).expect("valid time"),
            end_time: NaiveTime::from_hms_opt(23, 59, 59).expect("valid time"),
            available: false,
            exception: true,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

fn check_slot_bounds(start: NaiveTime, end: NaiveTime) -> Result<()> {
    if start >= end {
        return Err(GarageError::Validation(
            "slot start must be before its end".to_string(),
        ));
    }
    Ok(())
}

/// A case's booked slot instance. Cancellation is soft; a cancelled row
/// never blocks rebooking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub case_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub cancelled: bool,
    pub cancellation_date: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Builder for booking an appointment from a slot.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub case_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// One billed line, derived from a quote line at generation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub id: Uuid,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Immutable billing document derived from an accepted quote. Totals never
/// change after creation; only payment state does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub case_id: Uuid,
    pub quote_id: Uuid,

    /// `FAC-YYYY-NNN`, assigned once by the store
    pub invoice_number: String,

    pub lines: Vec<InvoiceLine>,

    pub total_pre_tax: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,

    pub paid: bool,
    pub payment_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Check,
    Transfer,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Check => "CHECK",
            PaymentMethod::Transfer => "TRANSFER",
            PaymentMethod::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "CASH" => Ok(PaymentMethod::Cash),
            "CARD" => Ok(PaymentMethod::Card),
            "CHECK" => Ok(PaymentMethod::Check),
            "TRANSFER" => Ok(PaymentMethod::Transfer),
            "OTHER" => Ok(PaymentMethod::Other),
            other => Err(GarageError::Validation(format!(
                "unknown payment method: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(GarageError::Validation(format!(
                "unknown payment status: {}",
                other
            ))),
        }
    }
}

/// One payment against an invoice; append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,

    /// External reference (payment processor id)
    pub transaction_ref: Option<String>,

    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Builder for recording a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub transaction_ref: Option<String>,
}

/// Catalog grouping (engine, brakes, tyres, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultGroup {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct NewFaultGroup {
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i64,
}

/// A catalog-defined problem type with its labor/parts tariff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    pub id: Uuid,
    pub group_id: Uuid,

    /// Denormalized from the group for display and line descriptions
    pub group_name: String,

    pub name: String,
    pub description: Option<String>,
    pub labor_hours: Decimal,
    pub parts_name: Option<String>,
    pub parts_cost: Decimal,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewFault {
    pub group_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub labor_hours: Decimal,
    pub parts_name: Option<String>,
    pub parts_cost: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labor_line_total() {
        let line = QuoteLine::labor("front pads", Decimal::new(15, 1), Decimal::new(60, 0));
        assert_eq!(line.line_total, Decimal::new(9000, 2));
        assert_eq!(line.quantity, 1);
    }

    #[test]
    fn test_parts_line_total() {
        let line = QuoteLine::parts("pads", 2, Decimal::new(4050, 2));
        assert_eq!(line.line_total, Decimal::new(8100, 2));
    }

    #[test]
    fn test_slot_bounds_rejected() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert!(NewSlot::recurring(Weekday::Mon, ten, nine).is_err());
        assert!(NewSlot::recurring(Weekday::Mon, nine, nine).is_err());
        assert!(NewSlot::specific(
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            nine,
            ten
        )
        .is_ok());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            CaseStatus::New,
            CaseStatus::QuoteIssued,
            CaseStatus::QuoteAccepted,
            CaseStatus::QuoteRefused,
            CaseStatus::ApptConfirmed,
            CaseStatus::InProgress,
            CaseStatus::Ready,
            CaseStatus::Closed,
            CaseStatus::Expired,
        ] {
            assert_eq!(CaseStatus::parse(status.as_str()).unwrap(), status);
        }
    }
}
