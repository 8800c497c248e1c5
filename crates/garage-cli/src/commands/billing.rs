//! Invoice and payment commands.

use anyhow::{anyhow, Result};
use chrono::Utc;
use comfy_table::Table;
use rust_decimal::Decimal;
use uuid::Uuid;

use garage_core::storage::{GarageStore, Invoice, NewPayment, SqliteStore};
use garage_core::InvoiceGenerator;

use crate::helpers::parse_method;

fn require_invoice(store: &SqliteStore, case_id: &Uuid) -> Result<Invoice> {
    store
        .get_invoice_for_case(case_id)?
        .ok_or_else(|| anyhow!("case {} has no invoice", case_id))
}

pub fn generate(store: &mut SqliteStore, case_id: Uuid) -> Result<()> {
    let invoice = InvoiceGenerator::new(store).generate(&case_id, Utc::now())?;
    println!(
        "generated invoice {} (total {})",
        invoice.invoice_number, invoice.total
    );
    Ok(())
}

pub fn show(store: &SqliteStore, case_id: Uuid, json: bool) -> Result<()> {
    let invoice = require_invoice(store, &case_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&invoice)?);
        return Ok(());
    }

    println!("invoice:  {}", invoice.invoice_number);
    println!("paid:     {}", if invoice.paid { "yes" } else { "no" });
    if let Some(date) = invoice.payment_date {
        println!("paid on:  {}", date.format("%Y-%m-%d %H:%M"));
    }

    let mut table = Table::new();
    table.set_header(["description", "qty", "unit", "total"]);
    for line in &invoice.lines {
        table.add_row([
            line.description.clone(),
            line.quantity.to_string(),
            line.unit_price.to_string(),
            line.line_total.to_string(),
        ]);
    }
    println!("{table}");

    println!("pre-tax:  {}", invoice.total_pre_tax);
    println!("VAT {}: {}", invoice.vat_rate, invoice.vat_amount);
    println!("total:    {}", invoice.total);

    let payments = store.payments_for_invoice(&invoice.id)?;
    if !payments.is_empty() {
        println!("payments:");
        for payment in payments {
            println!(
                "  {} {} via {} ({})",
                payment.created_at.format("%Y-%m-%d"),
                payment.amount,
                payment.method.as_str(),
                payment.status.as_str()
            );
        }
    }
    Ok(())
}

pub fn pay(
    store: &mut SqliteStore,
    case_id: Uuid,
    amount: Decimal,
    method: &str,
    transaction_ref: Option<String>,
) -> Result<()> {
    let method = parse_method(method)?;
    let invoice = require_invoice(store, &case_id)?;

    let now = Utc::now();
    let payment = InvoiceGenerator::new(store).record_payment(
        NewPayment {
            invoice_id: invoice.id,
            amount,
            method,
            transaction_ref,
        },
        now,
    )?;
    InvoiceGenerator::new(store).complete_payment(&payment.id, now)?;

    let invoice = require_invoice(store, &case_id)?;
    if invoice.paid {
        println!("payment recorded; invoice {} is settled", invoice.invoice_number);
    } else {
        println!(
            "payment recorded; invoice {} still open",
            invoice.invoice_number
        );
    }
    Ok(())
}
