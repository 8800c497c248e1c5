//! Storage engine trait definition.
//!
//! `GarageStore` is the persistence contract the workflow engines run
//! against. Besides plain CRUD it names the sections that must be atomic
//! under concurrent callers: document numbering, slot booking, status
//! transition + log append, and quote line/total updates. Implementations
//! retry storage contention on those sections a bounded number of times
//! before surfacing `GarageError::Conflict`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::config::GarageConfig;
use crate::error::Result;
use crate::numbering::DocumentKind;
use crate::storage::types::{
    Appointment, AppointmentSlot, Case, CaseFilter, CaseStatus, Fault, FaultGroup, Invoice,
    NewAppointment, NewCase, NewFault, NewFaultGroup, NewPayment, NewSlot, Payment, Quote,
    StatusLog,
};

pub trait GarageStore {
    // --- Settings ---

    /// Load the single settings row.
    fn load_settings(&self) -> Result<GarageConfig>;

    /// Replace the single settings row.
    fn update_settings(&mut self, config: &GarageConfig, at: DateTime<Utc>) -> Result<()>;

    // --- Fault catalog (write side; the read side is `FaultCatalog`) ---

    fn create_fault_group(&mut self, group: &NewFaultGroup) -> Result<FaultGroup>;

    fn create_fault(&mut self, fault: &NewFault) -> Result<Fault>;

    fn list_fault_groups(&self) -> Result<Vec<FaultGroup>>;

    /// All faults, active and inactive, in catalog order.
    fn list_faults(&self) -> Result<Vec<Fault>>;

    fn set_fault_active(&mut self, id: &Uuid, active: bool) -> Result<()>;

    // --- Cases ---

    fn insert_case(&mut self, case: &NewCase, at: DateTime<Utc>) -> Result<Case>;

    fn get_case(&self, id: &Uuid) -> Result<Option<Case>>;

    /// Cases matching the filter, newest first.
    fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>>;

    /// Replace the case's selected-fault set.
    fn set_case_faults(&mut self, case_id: &Uuid, fault_ids: &[Uuid], at: DateTime<Utc>)
        -> Result<()>;

    fn set_case_estimated_completion(
        &mut self,
        case_id: &Uuid,
        eta: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Compare-and-set the case status and append the matching StatusLog
    /// row in one transaction. Fails with `Conflict` if the stored status
    /// no longer equals `old`.
    fn transition_case(
        &mut self,
        case_id: &Uuid,
        old: CaseStatus,
        new: CaseStatus,
        actor: &str,
        comment: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<StatusLog>;

    /// Status history, oldest first.
    fn status_history(&self, case_id: &Uuid) -> Result<Vec<StatusLog>>;

    // --- Document numbering ---

    /// Atomically bump and return the next number for (kind, year).
    ///
    /// Single-statement upsert on the counter table; never implemented as
    /// a separate read-max plus write.
    fn next_document_number(&mut self, kind: DocumentKind, year: i32) -> Result<String>;

    // --- Quotes ---

    /// Persist a freshly generated quote with its lines. The store assigns
    /// `quote_number` from the yearly sequence inside the same transaction
    /// and returns the completed record; the number on the input is
    /// ignored.
    fn insert_quote(&mut self, quote: &Quote) -> Result<Quote>;

    fn get_quote(&self, id: &Uuid) -> Result<Option<Quote>>;

    fn get_quote_for_case(&self, case_id: &Uuid) -> Result<Option<Quote>>;

    /// Replace the quote's lines and totals in one transaction; readers
    /// never observe totals stale relative to lines.
    fn update_quote_lines(&mut self, quote: &Quote) -> Result<()>;

    /// Persist the decision flags (validated/accepted/refused, reason,
    /// acceptance date).
    fn set_quote_flags(&mut self, quote: &Quote) -> Result<()>;

    // --- Slots and appointments ---

    fn insert_slot(&mut self, slot: &NewSlot, at: DateTime<Utc>) -> Result<AppointmentSlot>;

    fn list_slots(&self) -> Result<Vec<AppointmentSlot>>;

    /// Non-exception slots usable on `date`: recurring slots matching its
    /// weekday plus specific slots bound to it, available ones only.
    fn slots_for_date(&self, date: NaiveDate) -> Result<Vec<AppointmentSlot>>;

    /// Whether a closure (exception) slot exists for `date`.
    fn has_exception(&self, date: NaiveDate) -> Result<bool>;

    /// Whether an active appointment occupies (date, start), optionally
    /// ignoring one appointment row (for reschedules).
    fn appointment_booked(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        exclude: Option<&Uuid>,
    ) -> Result<bool>;

    /// Create an appointment. The unique index over active (date, start)
    /// pairs is the correctness backstop: a constraint hit surfaces as
    /// `SlotTaken` even if the availability check raced.
    fn insert_appointment(
        &mut self,
        appointment: &NewAppointment,
        at: DateTime<Utc>,
    ) -> Result<Appointment>;

    fn get_appointment(&self, id: &Uuid) -> Result<Option<Appointment>>;

    fn active_appointment_for_case(&self, case_id: &Uuid) -> Result<Option<Appointment>>;

    /// Move an appointment to a new date/slot; same `SlotTaken` backstop
    /// as `insert_appointment`.
    fn reschedule_appointment(
        &mut self,
        id: &Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        at: DateTime<Utc>,
    ) -> Result<Appointment>;

    /// Soft-cancel: set the flag, timestamp and reason. The row remains
    /// for audit but stops blocking the slot and the case.
    fn cancel_appointment(
        &mut self,
        id: &Uuid,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Appointment>;

    // --- Invoices and payments ---

    /// Persist a freshly generated invoice with its lines, assigning
    /// `invoice_number` like `insert_quote` does for quotes.
    fn insert_invoice(&mut self, invoice: &Invoice) -> Result<Invoice>;

    fn get_invoice(&self, id: &Uuid) -> Result<Option<Invoice>>;

    fn get_invoice_for_case(&self, case_id: &Uuid) -> Result<Option<Invoice>>;

    fn insert_payment(&mut self, payment: &NewPayment, at: DateTime<Utc>) -> Result<Payment>;

    /// Mark a payment completed; in the same transaction, stamp the
    /// invoice paid once the completed sum covers its total.
    fn complete_payment(&mut self, payment_id: &Uuid, at: DateTime<Utc>) -> Result<Payment>;

    fn payments_for_invoice(&self, invoice_id: &Uuid) -> Result<Vec<Payment>>;
}
