//! Appointment scheduler.
//!
//! Resolves the bookable slots for a date from the recurring weekday
//! templates, the one-off slots and the holiday exceptions, and books,
//! reschedules or cancels a case's single appointment under the advance
//! and cancellation-window rules.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::config::GarageConfig;
use crate::error::{GarageError, Result};
use crate::notify::{dispatch, Notifier};
use crate::storage::traits::GarageStore;
use crate::storage::types::{Appointment, AppointmentSlot, CaseStatus, NewAppointment};
use crate::workflow::apply_transition;

pub struct AppointmentScheduler<'a, S> {
    store: &'a mut S,
    config: &'a GarageConfig,
    notifier: &'a dyn Notifier,
}

impl<'a, S: GarageStore> AppointmentScheduler<'a, S> {
    pub fn new(store: &'a mut S, config: &'a GarageConfig, notifier: &'a dyn Notifier) -> Self {
        Self {
            store,
            config,
            notifier,
        }
    }

    /// Bookable slots for `date`, ordered by start time.
    ///
    /// An exception slot on the date means the workshop is closed and
    /// short-circuits everything else. Otherwise recurring slots matching
    /// the weekday union with specific slots on the date, minus any slot
    /// whose start is already held by an active appointment.
    pub fn available_slots(&self, date: NaiveDate) -> Result<Vec<AppointmentSlot>> {
        if self.store.has_exception(date)? {
            return Ok(Vec::new());
        }

        let mut open = Vec::new();
        for slot in self.store.slots_for_date(date)? {
            if !self.store.appointment_booked(date, slot.start_time, None)? {
                open.push(slot);
            }
        }
        open.sort_by_key(|slot| slot.start_time);
        Ok(open)
    }

    /// Book one of the date's available slots for a `QUOTE_ACCEPTED`
    /// case. Requires at least one day of notice; transitions the case to
    /// `APPT_CONFIRMED`.
    pub fn book(
        &mut self,
        case_id: &Uuid,
        date: NaiveDate,
        slot_id: &Uuid,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Appointment> {
        let case = self
            .store
            .get_case(case_id)?
            .ok_or_else(|| GarageError::NotFound(format!("case {}", case_id)))?;
        if case.status != CaseStatus::QuoteAccepted {
            return Err(GarageError::InvalidState(case.status));
        }
        if date <= now.date_naive() {
            return Err(GarageError::NotAdvanceEnough);
        }
        // A previously cancelled appointment never blocks; an active one does.
        if self.store.active_appointment_for_case(case_id)?.is_some() {
            return Err(GarageError::InvalidState(case.status));
        }

        let slot = self
            .available_slots(date)?
            .into_iter()
            .find(|slot| slot.id == *slot_id)
            .ok_or(GarageError::SlotTaken)?;

        let appointment = self.store.insert_appointment(
            &NewAppointment {
                case_id: *case_id,
                date,
                start_time: slot.start_time,
                end_time: slot.end_time,
            },
            now,
        )?;

        apply_transition(
            self.store,
            self.notifier,
            case_id,
            CaseStatus::ApptConfirmed,
            actor,
            Some("appointment booked"),
            now,
        )?;
        dispatch(
            "appointment_created",
            self.notifier.on_appointment_created(&appointment),
        );
        Ok(appointment)
    }

    /// Whether the appointment can still be modified or cancelled: more
    /// than the configured window remains before its start, and it is not
    /// already cancelled.
    pub fn can_be_modified(&self, appointment: &Appointment, now: DateTime<Utc>) -> bool {
        if appointment.cancelled {
            return false;
        }
        let start = appointment.date.and_time(appointment.start_time);
        start - now.naive_utc() > Duration::hours(self.config.cancel_window_hours as i64)
    }

    /// Move an appointment to a new date/slot. The new slot is validated
    /// exactly like a fresh booking, except the appointment's own row is
    /// excluded from the collision check. Case status is untouched.
    pub fn modify(
        &mut self,
        appointment_id: &Uuid,
        new_date: NaiveDate,
        new_slot_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment> {
        let appointment = self.require_appointment(appointment_id)?;
        if !self.can_be_modified(&appointment, now) {
            return Err(GarageError::TooLateToChange);
        }
        if new_date <= now.date_naive() {
            return Err(GarageError::NotAdvanceEnough);
        }
        if self.store.has_exception(new_date)? {
            return Err(GarageError::SlotTaken);
        }

        let slot = self
            .store
            .slots_for_date(new_date)?
            .into_iter()
            .find(|slot| slot.id == *new_slot_id)
            .ok_or(GarageError::SlotTaken)?;
        if self
            .store
            .appointment_booked(new_date, slot.start_time, Some(&appointment.id))?
        {
            return Err(GarageError::SlotTaken);
        }

        let appointment = self.store.reschedule_appointment(
            &appointment.id,
            new_date,
            slot.start_time,
            slot.end_time,
            now,
        )?;
        dispatch(
            "appointment_modified",
            self.notifier.on_appointment_modified(&appointment),
        );
        Ok(appointment)
    }

    /// Soft-cancel an appointment and regress the case to
    /// `QUOTE_ACCEPTED` so a new slot can be booked.
    pub fn cancel(
        &mut self,
        appointment_id: &Uuid,
        reason: Option<&str>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Appointment> {
        let appointment = self.require_appointment(appointment_id)?;
        if !self.can_be_modified(&appointment, now) {
            return Err(GarageError::TooLateToChange);
        }

        let appointment = self
            .store
            .cancel_appointment(&appointment.id, reason, now)?;

        apply_transition(
            self.store,
            self.notifier,
            &appointment.case_id,
            CaseStatus::QuoteAccepted,
            actor,
            Some("appointment cancelled"),
            now,
        )?;
        dispatch(
            "appointment_cancelled",
            self.notifier.on_appointment_cancelled(&appointment),
        );
        Ok(appointment)
    }

    fn require_appointment(&self, id: &Uuid) -> Result<Appointment> {
        self.store
            .get_appointment(id)?
            .ok_or_else(|| GarageError::NotFound(format!("appointment {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NullNotifier;
    use crate::storage::SqliteStore;
    use chrono::{NaiveTime, TimeZone};

    fn appointment(date: NaiveDate, start: NaiveTime) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            date,
            start_time: start,
            end_time: start + Duration::hours(1),
            cancelled: false,
            cancellation_date: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cancel_window() {
        let config = GarageConfig::default();
        let mut store = SqliteStore::in_memory(&config).unwrap();
        let notifier = NullNotifier;
        let scheduler = AppointmentScheduler::new(&mut store, &config, &notifier);

        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let appt = appointment(date, nine);

        // two days out: fine
        let now = Utc.with_ymd_and_hms(2026, 3, 8, 9, 0, 0).unwrap();
        assert!(scheduler.can_be_modified(&appt, now));

        // exactly 24h before: window closed (strict inequality)
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 9, 0, 0).unwrap();
        assert!(!scheduler.can_be_modified(&appt, now));

        // 30 minutes before start: far too late
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 8, 30, 0).unwrap();
        assert!(!scheduler.can_be_modified(&appt, now));
    }

    #[test]
    fn test_cancelled_appointment_is_frozen() {
        let config = GarageConfig::default();
        let mut store = SqliteStore::in_memory(&config).unwrap();
        let notifier = NullNotifier;
        let scheduler = AppointmentScheduler::new(&mut store, &config, &notifier);

        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let mut appt = appointment(date, nine);
        appt.cancelled = true;

        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        assert!(!scheduler.can_be_modified(&appt, now));
    }
}
