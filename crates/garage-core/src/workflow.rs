//! Case workflow state machine.
//!
//! This is the one place a case status is allowed to change. Every
//! transition is checked against the table below, persisted atomically
//! with its StatusLog row, and followed by a best-effort notification.
//! The other engines route their status changes through
//! [`apply_transition`] so the audit and notification behavior is
//! identical everywhere.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::FaultCatalog;
use crate::error::{GarageError, Result};
use crate::notify::{dispatch, Notifier};
use crate::storage::traits::GarageStore;
use crate::storage::types::{Case, CaseFilter, CaseStatus, NewCase, StatusLog};

/// Permitted targets per current status. Refused, expired and closed cases
/// are terminal; `ApptConfirmed -> QuoteAccepted` is the regression taken
/// when an appointment is cancelled.
pub fn allowed_targets(from: CaseStatus) -> &'static [CaseStatus] {
    use CaseStatus::*;
    match from {
        New => &[QuoteIssued, Expired],
        QuoteIssued => &[QuoteAccepted, QuoteRefused, Expired],
        QuoteAccepted => &[ApptConfirmed],
        ApptConfirmed => &[InProgress, QuoteAccepted],
        InProgress => &[Ready],
        Ready => &[Closed],
        QuoteRefused | Expired | Closed => &[],
    }
}

pub fn is_transition_allowed(from: CaseStatus, to: CaseStatus) -> bool {
    allowed_targets(from).contains(&to)
}

/// Guarded transition: table check, atomic status+log write, then
/// fire-and-forget notification. A notifier failure is logged, never
/// propagated.
pub(crate) fn apply_transition<S: GarageStore>(
    store: &mut S,
    notifier: &dyn Notifier,
    case_id: &Uuid,
    target: CaseStatus,
    actor: &str,
    comment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Case> {
    let case = store
        .get_case(case_id)?
        .ok_or_else(|| GarageError::NotFound(format!("case {}", case_id)))?;
    if !is_transition_allowed(case.status, target) {
        return Err(GarageError::InvalidTransition {
            from: case.status,
            to: target,
        });
    }

    store.transition_case(case_id, case.status, target, actor, comment, now)?;

    let case = Case {
        status: target,
        updated_at: now,
        ..case
    };
    dispatch(
        "case_status_changed",
        notifier.on_case_status_changed(&case, target),
    );
    Ok(case)
}

/// Orchestrates the case lifecycle against a store and a notifier.
pub struct CaseWorkflow<'a, S> {
    store: &'a mut S,
    notifier: &'a dyn Notifier,
}

impl<'a, S: GarageStore + FaultCatalog> CaseWorkflow<'a, S> {
    pub fn new(store: &'a mut S, notifier: &'a dyn Notifier) -> Self {
        Self { store, notifier }
    }

    /// Register a new repair request; the case starts in `NEW`.
    pub fn create_case(&mut self, new_case: NewCase, now: DateTime<Utc>) -> Result<Case> {
        let case = self.store.insert_case(&new_case, now)?;
        dispatch("new_case", self.notifier.on_new_case(&case));
        Ok(case)
    }

    /// Add catalog faults to a case. Only permitted while the case is
    /// still `NEW`; faults must exist and be active.
    pub fn attach_faults(
        &mut self,
        case_id: &Uuid,
        fault_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<Case> {
        let case = self.require_case(case_id)?;
        if case.status != CaseStatus::New {
            return Err(GarageError::InvalidState(case.status));
        }

        for fault_id in fault_ids {
            let fault = self
                .store
                .fault_by_id(fault_id)?
                .ok_or_else(|| GarageError::NotFound(format!("fault {}", fault_id)))?;
            if !fault.active {
                return Err(GarageError::Validation(format!(
                    "fault '{}' is no longer offered",
                    fault.name
                )));
            }
        }

        let mut merged = case.fault_ids.clone();
        for fault_id in fault_ids {
            if !merged.contains(fault_id) {
                merged.push(*fault_id);
            }
        }
        self.store.set_case_faults(case_id, &merged, now)?;
        self.require_case(case_id)
    }

    /// Remove one fault from a case; `NEW` only.
    pub fn detach_fault(
        &mut self,
        case_id: &Uuid,
        fault_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<Case> {
        let case = self.require_case(case_id)?;
        if case.status != CaseStatus::New {
            return Err(GarageError::InvalidState(case.status));
        }

        let remaining: Vec<Uuid> = case
            .fault_ids
            .iter()
            .copied()
            .filter(|id| id != fault_id)
            .collect();
        if remaining.len() == case.fault_ids.len() {
            return Err(GarageError::NotFound(format!(
                "fault {} on case {}",
                fault_id, case_id
            )));
        }
        self.store.set_case_faults(case_id, &remaining, now)?;
        self.require_case(case_id)
    }

    /// Move a case along one edge of the transition table.
    pub fn transition(
        &mut self,
        case_id: &Uuid,
        target: CaseStatus,
        actor: &str,
        comment: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Case> {
        apply_transition(self.store, self.notifier, case_id, target, actor, comment, now)
    }

    /// Record the estimated completion of the repair.
    pub fn set_estimated_completion(
        &mut self,
        case_id: &Uuid,
        eta: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Case> {
        self.store.set_case_estimated_completion(case_id, eta, now)?;
        self.require_case(case_id)
    }

    /// Full status timeline, oldest first.
    pub fn status_history(&self, case_id: &Uuid) -> Result<Vec<StatusLog>> {
        self.store.status_history(case_id)
    }

    /// Sweep: expire every `QUOTE_ISSUED` case whose quote validity has
    /// lapsed. Returns the cases moved to `EXPIRED`.
    pub fn expire_overdue(&mut self, now: DateTime<Utc>) -> Result<Vec<Case>> {
        let filter = CaseFilter {
            status: Some(CaseStatus::QuoteIssued),
            ..CaseFilter::default()
        };
        let mut expired = Vec::new();
        for case in self.store.list_cases(&filter)? {
            let Some(quote) = self.store.get_quote_for_case(&case.id)? else {
                continue;
            };
            if crate::quote::is_expired(&quote, now.date_naive()) {
                let case = apply_transition(
                    self.store,
                    self.notifier,
                    &case.id,
                    CaseStatus::Expired,
                    "system",
                    Some("quote validity lapsed"),
                    now,
                )?;
                expired.push(case);
            }
        }
        Ok(expired)
    }

    fn require_case(&self, case_id: &Uuid) -> Result<Case> {
        self.store
            .get_case(case_id)?
            .ok_or_else(|| GarageError::NotFound(format!("case {}", case_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CaseStatus::*;

    #[test]
    fn test_forward_path_is_allowed() {
        for (from, to) in [
            (New, QuoteIssued),
            (QuoteIssued, QuoteAccepted),
            (QuoteAccepted, ApptConfirmed),
            (ApptConfirmed, InProgress),
            (InProgress, Ready),
            (Ready, Closed),
        ] {
            assert!(is_transition_allowed(from, to), "{} -> {}", from, to);
        }
    }

    #[test]
    fn test_side_branches() {
        assert!(is_transition_allowed(New, Expired));
        assert!(is_transition_allowed(QuoteIssued, Expired));
        assert!(is_transition_allowed(QuoteIssued, QuoteRefused));
        // regression taken on appointment cancellation
        assert!(is_transition_allowed(ApptConfirmed, QuoteAccepted));
    }

    #[test]
    fn test_terminal_statuses_have_no_edges() {
        for status in [QuoteRefused, Expired, Closed] {
            assert!(allowed_targets(status).is_empty());
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        assert!(!is_transition_allowed(New, QuoteAccepted));
        assert!(!is_transition_allowed(New, Closed));
        assert!(!is_transition_allowed(QuoteAccepted, InProgress));
        assert!(!is_transition_allowed(InProgress, Closed));
        // no walking backwards except the cancel regression
        assert!(!is_transition_allowed(QuoteAccepted, QuoteIssued));
        assert!(!is_transition_allowed(Ready, InProgress));
    }
}
