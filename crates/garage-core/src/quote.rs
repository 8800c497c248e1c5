//! Quote engine.
//!
//! Builds a quote's lines from the case's selected faults at the current
//! catalog tariffs, keeps totals derived from lines, and walks the quote
//! through validation and the client's accept/refuse decision.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::catalog::FaultCatalog;
use crate::config::GarageConfig;
use crate::error::{GarageError, Result};
use crate::notify::{dispatch, Notifier};
use crate::storage::traits::GarageStore;
use crate::storage::types::{CaseStatus, LineKind, Quote, QuoteLine};
use crate::workflow::{apply_transition, is_transition_allowed};

/// Derived quote totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteTotals {
    pub labor: Decimal,
    pub parts: Decimal,
    pub pre_tax: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,
}

/// Recompute totals from lines. Pure and idempotent; every line mutation
/// must be followed by this.
pub fn calculate_totals(lines: &[QuoteLine], vat_rate: Decimal) -> QuoteTotals {
    let labor: Decimal = lines
        .iter()
        .filter(|line| line.kind == LineKind::Labor)
        .map(|line| line.line_total)
        .sum();
    let parts: Decimal = lines
        .iter()
        .filter(|line| line.kind == LineKind::Parts)
        .map(|line| line.line_total)
        .sum();
    let pre_tax = labor + parts;
    let vat_amount = (pre_tax * vat_rate).round_dp(2);
    QuoteTotals {
        labor,
        parts,
        pre_tax,
        vat_rate,
        vat_amount,
        total: pre_tax + vat_amount,
    }
}

/// A quote is expired once today is past its validity date, unless the
/// client already accepted it.
pub fn is_expired(quote: &Quote, today: NaiveDate) -> bool {
    today > quote.validity_date && !quote.accepted
}

fn apply_totals(quote: &mut Quote, totals: QuoteTotals) {
    quote.total_labor = totals.labor;
    quote.total_parts = totals.parts;
    quote.total_pre_tax = totals.pre_tax;
    quote.vat_rate = totals.vat_rate;
    quote.vat_amount = totals.vat_amount;
    quote.total = totals.total;
}

pub struct QuoteEngine<'a, S> {
    store: &'a mut S,
    config: &'a GarageConfig,
    notifier: &'a dyn Notifier,
}

impl<'a, S: GarageStore + FaultCatalog> QuoteEngine<'a, S> {
    pub fn new(store: &'a mut S, config: &'a GarageConfig, notifier: &'a dyn Notifier) -> Self {
        Self {
            store,
            config,
            notifier,
        }
    }

    /// Generate the quote for a `NEW` case from its selected faults: one
    /// labor line per fault at the current hourly rate, plus a parts line
    /// when the fault's tariff carries a parts cost.
    pub fn generate(&mut self, case_id: &Uuid, now: DateTime<Utc>) -> Result<Quote> {
        let case = self
            .store
            .get_case(case_id)?
            .ok_or_else(|| GarageError::NotFound(format!("case {}", case_id)))?;
        if case.status != CaseStatus::New {
            return Err(GarageError::InvalidState(case.status));
        }
        if self.store.get_quote_for_case(case_id)?.is_some() {
            return Err(GarageError::QuoteAlreadyExists);
        }
        if case.fault_ids.is_empty() {
            return Err(GarageError::NoFaultsSelected);
        }

        let hourly_rate = self.store.current_hourly_rate()?;
        let vat_rate = self.store.current_vat_rate()?;

        let mut lines = Vec::new();
        for fault_id in &case.fault_ids {
            let fault = self
                .store
                .fault_by_id(fault_id)?
                .ok_or_else(|| GarageError::NotFound(format!("fault {}", fault_id)))?;

            let labor_desc = match fault.description.as_deref() {
                Some(desc) => format!("{} - {}: {}", fault.group_name, fault.name, desc),
                None => format!("{} - {}", fault.group_name, fault.name),
            };
            lines.push(QuoteLine::labor(labor_desc, fault.labor_hours, hourly_rate));

            if fault.parts_cost > Decimal::ZERO {
                let parts_desc = match fault.parts_name.as_deref() {
                    Some(name) => format!("{} ({})", name, fault.name),
                    None => format!("Parts for {}", fault.name),
                };
                lines.push(QuoteLine::parts(parts_desc, 1, fault.parts_cost));
            }
        }

        let totals = calculate_totals(&lines, vat_rate);
        let validity_date =
            (now + Duration::days(self.config.quote_validity_days as i64)).date_naive();

        let mut quote = Quote {
            id: Uuid::new_v4(),
            case_id: *case_id,
            quote_number: String::new(),
            lines,
            total_labor: Decimal::ZERO,
            total_parts: Decimal::ZERO,
            total_pre_tax: Decimal::ZERO,
            vat_rate,
            vat_amount: Decimal::ZERO,
            total: Decimal::ZERO,
            validity_date,
            validated: false,
            accepted: false,
            refused: false,
            refusal_reason: None,
            acceptance_date: None,
            created_at: now,
            updated_at: now,
        };
        apply_totals(&mut quote, totals);

        // Number assignment and persistence happen in one transaction.
        self.store.insert_quote(&quote)
    }

    /// Replace the quote's lines. Rejected once the manager validated the
    /// quote; totals are recomputed atomically with the line change.
    pub fn edit_lines(
        &mut self,
        quote_id: &Uuid,
        mut lines: Vec<QuoteLine>,
        now: DateTime<Utc>,
    ) -> Result<Quote> {
        let mut quote = self.require_quote(quote_id)?;
        if quote.validated {
            return Err(GarageError::QuoteLocked);
        }

        for line in &mut lines {
            line.recompute_total();
        }
        let totals = calculate_totals(&lines, quote.vat_rate);
        quote.lines = lines;
        apply_totals(&mut quote, totals);
        quote.updated_at = now;

        self.store.update_quote_lines(&quote)?;
        Ok(quote)
    }

    /// Manager validation: freezes the line set and issues the quote to
    /// the client, transitioning the case to `QUOTE_ISSUED`.
    pub fn validate(&mut self, quote_id: &Uuid, actor: &str, now: DateTime<Utc>) -> Result<Quote> {
        let mut quote = self.require_quote(quote_id)?;
        if quote.validated {
            return Err(GarageError::QuoteLocked);
        }
        if quote.lines.is_empty() {
            return Err(GarageError::EmptyQuote);
        }

        let case = self
            .store
            .get_case(&quote.case_id)?
            .ok_or_else(|| GarageError::NotFound(format!("case {}", quote.case_id)))?;
        if !is_transition_allowed(case.status, CaseStatus::QuoteIssued) {
            return Err(GarageError::InvalidTransition {
                from: case.status,
                to: CaseStatus::QuoteIssued,
            });
        }

        quote.validated = true;
        quote.updated_at = now;
        self.store.set_quote_flags(&quote)?;

        let comment = format!("quote {} issued", quote.quote_number);
        apply_transition(
            self.store,
            self.notifier,
            &quote.case_id,
            CaseStatus::QuoteIssued,
            actor,
            Some(&comment),
            now,
        )?;
        Ok(quote)
    }

    /// Client acceptance. Rejected after the validity date has passed.
    pub fn accept(&mut self, quote_id: &Uuid, actor: &str, now: DateTime<Utc>) -> Result<Quote> {
        let mut quote = self.require_quote(quote_id)?;
        if !quote.validated {
            return Err(GarageError::NotYetIssued);
        }
        if quote.accepted || quote.refused {
            return Err(GarageError::AlreadyDecided);
        }
        if is_expired(&quote, now.date_naive()) {
            return Err(GarageError::Expired);
        }

        let case = self
            .store
            .get_case(&quote.case_id)?
            .ok_or_else(|| GarageError::NotFound(format!("case {}", quote.case_id)))?;
        if !is_transition_allowed(case.status, CaseStatus::QuoteAccepted) {
            return Err(GarageError::InvalidTransition {
                from: case.status,
                to: CaseStatus::QuoteAccepted,
            });
        }

        quote.accepted = true;
        quote.acceptance_date = Some(now);
        quote.updated_at = now;
        self.store.set_quote_flags(&quote)?;

        let comment = format!("quote {} accepted", quote.quote_number);
        let case = apply_transition(
            self.store,
            self.notifier,
            &quote.case_id,
            CaseStatus::QuoteAccepted,
            actor,
            Some(&comment),
            now,
        )?;
        dispatch("quote_accepted", self.notifier.on_quote_accepted(&case));
        Ok(quote)
    }

    /// Client refusal, with an optional reason. Terminal for the case.
    pub fn refuse(
        &mut self,
        quote_id: &Uuid,
        reason: Option<&str>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Quote> {
        let mut quote = self.require_quote(quote_id)?;
        if !quote.validated {
            return Err(GarageError::NotYetIssued);
        }
        if quote.accepted || quote.refused {
            return Err(GarageError::AlreadyDecided);
        }

        let case = self
            .store
            .get_case(&quote.case_id)?
            .ok_or_else(|| GarageError::NotFound(format!("case {}", quote.case_id)))?;
        if !is_transition_allowed(case.status, CaseStatus::QuoteRefused) {
            return Err(GarageError::InvalidTransition {
                from: case.status,
                to: CaseStatus::QuoteRefused,
            });
        }

        quote.refused = true;
        quote.refusal_reason = reason.map(|r| r.to_string());
        quote.updated_at = now;
        self.store.set_quote_flags(&quote)?;

        apply_transition(
            self.store,
            self.notifier,
            &quote.case_id,
            CaseStatus::QuoteRefused,
            actor,
            reason,
            now,
        )?;
        Ok(quote)
    }

    fn require_quote(&self, quote_id: &Uuid) -> Result<Quote> {
        self.store
            .get_quote(quote_id)?
            .ok_or_else(|| GarageError::NotFound(format!("quote {}", quote_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dec(value: &str) -> Decimal {
        value.parse().expect("valid decimal")
    }

    #[test]
    fn test_two_fault_scenario_totals() {
        // fault A: 1.5h @ 60 with 80.00 in parts; fault B: 1.0h @ 60, no parts
        let lines = vec![
            QuoteLine::labor("Brakes - Front pads", dec("1.5"), dec("60")),
            QuoteLine::parts("Parts for Front pads", 1, dec("80.00")),
            QuoteLine::labor("Engine - Oil change", dec("1.0"), dec("60")),
        ];
        let totals = calculate_totals(&lines, dec("0.20"));
        assert_eq!(totals.labor, dec("150.00"));
        assert_eq!(totals.parts, dec("80.00"));
        assert_eq!(totals.pre_tax, dec("230.00"));
        assert_eq!(totals.vat_amount, dec("46.00"));
        assert_eq!(totals.total, dec("276.00"));
    }

    #[test]
    fn test_totals_are_idempotent() {
        let lines = vec![
            QuoteLine::labor("labor", dec("2.5"), dec("60")),
            QuoteLine::parts("parts", 3, dec("12.34")),
        ];
        let first = calculate_totals(&lines, dec("0.20"));
        let second = calculate_totals(&lines, dec("0.20"));
        assert_eq!(first, second);
        assert_eq!(first.total, first.pre_tax + first.vat_amount);
        assert_eq!(first.pre_tax, first.labor + first.parts);
    }

    #[test]
    fn test_empty_lines_yield_zero_totals() {
        let totals = calculate_totals(&[], dec("0.20"));
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_expiry_boundary() {
        let mut quote = Quote {
            id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            quote_number: "DEV-2026-001".to_string(),
            lines: Vec::new(),
            total_labor: Decimal::ZERO,
            total_parts: Decimal::ZERO,
            total_pre_tax: Decimal::ZERO,
            vat_rate: dec("0.20"),
            vat_amount: Decimal::ZERO,
            total: Decimal::ZERO,
            validity_date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
            validated: true,
            accepted: false,
            refused: false,
            refusal_reason: None,
            acceptance_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        // still acceptable on the validity date itself
        assert!(!is_expired(
            &quote,
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
        ));
        assert!(is_expired(
            &quote,
            NaiveDate::from_ymd_opt(2026, 3, 16).unwrap()
        ));

        // an accepted quote never expires
        quote.accepted = true;
        assert!(!is_expired(
            &quote,
            NaiveDate::from_ymd_opt(2026, 3, 16).unwrap()
        ));
    }
}
