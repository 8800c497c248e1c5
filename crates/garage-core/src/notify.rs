//! Notification dispatch.
//!
//! The workflow emits events to an external dispatcher (email, in-app
//! notices). Dispatch is strictly fire-and-forget: a failing notifier is
//! logged and swallowed, never allowed to fail or roll back the state
//! change that triggered it.

use crate::error::Result;
use crate::storage::types::{Appointment, Case, CaseStatus};

/// Consumer of workflow events. Implementations may fan out to email or
/// in-app notices; the core neither awaits nor depends on their success.
pub trait Notifier {
    fn on_new_case(&self, case: &Case) -> Result<()>;

    fn on_case_status_changed(&self, case: &Case, new_status: CaseStatus) -> Result<()>;

    fn on_quote_accepted(&self, case: &Case) -> Result<()>;

    fn on_appointment_created(&self, appointment: &Appointment) -> Result<()>;

    fn on_appointment_modified(&self, appointment: &Appointment) -> Result<()>;

    fn on_appointment_cancelled(&self, appointment: &Appointment) -> Result<()>;
}

/// No-op notifier for tests and headless runs.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn on_new_case(&self, _case: &Case) -> Result<()> {
        Ok(())
    }

    fn on_case_status_changed(&self, _case: &Case, _new_status: CaseStatus) -> Result<()> {
        Ok(())
    }

    fn on_quote_accepted(&self, _case: &Case) -> Result<()> {
        Ok(())
    }

    fn on_appointment_created(&self, _appointment: &Appointment) -> Result<()> {
        Ok(())
    }

    fn on_appointment_modified(&self, _appointment: &Appointment) -> Result<()> {
        Ok(())
    }

    fn on_appointment_cancelled(&self, _appointment: &Appointment) -> Result<()> {
        Ok(())
    }
}

/// Notifier that reports events through the `log` facade.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn on_new_case(&self, case: &Case) -> Result<()> {
        log::info!("new case {} for client {}", case.id, case.client_id);
        Ok(())
    }

    fn on_case_status_changed(&self, case: &Case, new_status: CaseStatus) -> Result<()> {
        log::info!("case {} is now {}", case.id, new_status);
        Ok(())
    }

    fn on_quote_accepted(&self, case: &Case) -> Result<()> {
        log::info!("quote accepted on case {}", case.id);
        Ok(())
    }

    fn on_appointment_created(&self, appointment: &Appointment) -> Result<()> {
        log::info!(
            "appointment booked for case {} on {} at {}",
            appointment.case_id,
            appointment.date,
            appointment.start_time
        );
        Ok(())
    }

    fn on_appointment_modified(&self, appointment: &Appointment) -> Result<()> {
        log::info!(
            "appointment moved for case {} to {} at {}",
            appointment.case_id,
            appointment.date,
            appointment.start_time
        );
        Ok(())
    }

    fn on_appointment_cancelled(&self, appointment: &Appointment) -> Result<()> {
        log::info!("appointment cancelled for case {}", appointment.case_id);
        Ok(())
    }
}

/// Swallow a dispatch failure, keeping only a log trace.
pub(crate) fn dispatch(event: &str, result: Result<()>) {
    if let Err(err) = result {
        log::warn!("notification dispatch failed ({}): {}", event, err);
    }
}
