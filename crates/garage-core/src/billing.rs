//! Invoice generation and payments.
//!
//! An invoice is derived once from an accepted quote: totals are copied
//! verbatim and each quote line becomes one invoice line. Parts lines map
//! directly; labor lines collapse to quantity 1 at the line's total,
//! because hours are fractional and an invoice line's quantity is a whole
//! unit, with the hours and rate kept in the description. Billing never
//! touches case status.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{GarageError, Result};
use crate::storage::traits::GarageStore;
use crate::storage::types::{
    Invoice, InvoiceLine, LineKind, NewPayment, Payment, QuoteLine,
};

fn invoice_line_from(line: &QuoteLine) -> InvoiceLine {
    match line.kind {
        LineKind::Labor => {
            let hours = line.hours.unwrap_or(Decimal::ZERO);
            let rate = line.hourly_rate.unwrap_or(Decimal::ZERO);
            InvoiceLine {
                id: Uuid::new_v4(),
                description: format!("{} ({}h @ {}/h)", line.description, hours, rate),
                quantity: 1,
                unit_price: line.line_total,
                line_total: line.line_total,
            }
        }
        LineKind::Parts => InvoiceLine {
            id: Uuid::new_v4(),
            description: line.description.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total,
        },
    }
}

pub struct InvoiceGenerator<'a, S> {
    store: &'a mut S,
}

impl<'a, S: GarageStore> InvoiceGenerator<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Derive the case's invoice from its accepted quote.
    pub fn generate(&mut self, case_id: &Uuid, now: DateTime<Utc>) -> Result<Invoice> {
        let case = self
            .store
            .get_case(case_id)?
            .ok_or_else(|| GarageError::NotFound(format!("case {}", case_id)))?;
        if self.store.get_invoice_for_case(&case.id)?.is_some() {
            return Err(GarageError::InvoiceAlreadyExists);
        }
        let quote = self
            .store
            .get_quote_for_case(&case.id)?
            .ok_or(GarageError::NoQuote)?;
        if !quote.accepted {
            return Err(GarageError::QuoteNotAccepted);
        }

        let lines = quote.lines.iter().map(invoice_line_from).collect();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            case_id: case.id,
            quote_id: quote.id,
            invoice_number: String::new(),
            lines,
            total_pre_tax: quote.total_pre_tax,
            vat_rate: quote.vat_rate,
            vat_amount: quote.vat_amount,
            total: quote.total,
            paid: false,
            payment_date: None,
            created_at: now,
            updated_at: now,
        };

        // Number assignment and persistence happen in one transaction.
        self.store.insert_invoice(&invoice)
    }

    /// Append a pending payment against an invoice.
    pub fn record_payment(&mut self, payment: NewPayment, now: DateTime<Utc>) -> Result<Payment> {
        if payment.amount <= Decimal::ZERO {
            return Err(GarageError::Validation(
                "payment amount must be positive".to_string(),
            ));
        }
        self.store.insert_payment(&payment, now)
    }

    /// Mark a pending payment completed. The invoice flips to paid once
    /// the completed payments cover its total.
    pub fn complete_payment(&mut self, payment_id: &Uuid, now: DateTime<Utc>) -> Result<Payment> {
        self.store.complete_payment(payment_id, now)
    }

    pub fn payments(&self, invoice_id: &Uuid) -> Result<Vec<Payment>> {
        self.store.payments_for_invoice(invoice_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().expect("valid decimal")
    }

    #[test]
    fn test_labor_line_collapses_to_unit_quantity() {
        let labor = QuoteLine::labor("Engine - Timing belt", dec("3.5"), dec("60"));
        let line = invoice_line_from(&labor);
        assert_eq!(line.quantity, 1);
        assert_eq!(line.unit_price, dec("210.00"));
        assert_eq!(line.line_total, dec("210.00"));
        // hours and rate stay traceable in the description
        assert!(line.description.contains("3.5h"));
        assert!(line.description.contains("60/h"));
    }

    #[test]
    fn test_parts_line_copies_through() {
        let parts = QuoteLine::parts("Brake pads", 2, dec("40.00"));
        let line = invoice_line_from(&parts);
        assert_eq!(line.description, "Brake pads");
        assert_eq!(line.quantity, 2);
        assert_eq!(line.unit_price, dec("40.00"));
        assert_eq!(line.line_total, dec("80.00"));
    }
}
