//! Quote commands. Quotes are addressed through their case.

use anyhow::{anyhow, Result};
use chrono::Utc;
use comfy_table::Table;
use uuid::Uuid;

use garage_core::storage::{GarageStore, Quote, SqliteStore};
use garage_core::{LogNotifier, QuoteEngine};

fn require_quote(store: &SqliteStore, case_id: &Uuid) -> Result<Quote> {
    store
        .get_quote_for_case(case_id)?
        .ok_or_else(|| anyhow!("case {} has no quote", case_id))
}

pub fn generate(store: &mut SqliteStore, case_id: Uuid) -> Result<()> {
    let config = store.load_settings()?;
    let notifier = LogNotifier;
    let quote = QuoteEngine::new(store, &config, &notifier).generate(&case_id, Utc::now())?;
    println!(
        "generated quote {} ({} lines, total {})",
        quote.quote_number,
        quote.lines.len(),
        quote.total
    );
    Ok(())
}

pub fn show(store: &SqliteStore, case_id: Uuid, json: bool) -> Result<()> {
    let quote = require_quote(store, &case_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&quote)?);
        return Ok(());
    }

    println!("quote:     {}", quote.quote_number);
    println!("valid to:  {}", quote.validity_date);
    let state = if quote.refused {
        "refused"
    } else if quote.accepted {
        "accepted"
    } else if quote.validated {
        "issued"
    } else {
        "draft"
    };
    println!("state:     {}", state);

    let mut table = Table::new();
    table.set_header(["kind", "description", "qty", "unit", "total"]);
    for line in &quote.lines {
        let (qty, unit) = match line.hours {
            Some(hours) => (
                format!("{}h", hours),
                line.hourly_rate.map(|r| r.to_string()).unwrap_or_default(),
            ),
            None => (line.quantity.to_string(), line.unit_price.to_string()),
        };
        table.add_row([
            line.kind.as_str().to_string(),
            line.description.clone(),
            qty,
            unit,
            line.line_total.to_string(),
        ]);
    }
    println!("{table}");

    println!("labor:     {}", quote.total_labor);
    println!("parts:     {}", quote.total_parts);
    println!("pre-tax:   {}", quote.total_pre_tax);
    println!("VAT {}:  {}", quote.vat_rate, quote.vat_amount);
    println!("total:     {}", quote.total);
    Ok(())
}

pub fn validate(store: &mut SqliteStore, case_id: Uuid, actor: &str) -> Result<()> {
    let quote = require_quote(store, &case_id)?;
    let config = store.load_settings()?;
    let notifier = LogNotifier;
    let quote = QuoteEngine::new(store, &config, &notifier).validate(&quote.id, actor, Utc::now())?;
    println!("quote {} issued to the client", quote.quote_number);
    Ok(())
}

pub fn accept(store: &mut SqliteStore, case_id: Uuid, actor: &str) -> Result<()> {
    let quote = require_quote(store, &case_id)?;
    let config = store.load_settings()?;
    let notifier = LogNotifier;
    let quote = QuoteEngine::new(store, &config, &notifier).accept(&quote.id, actor, Utc::now())?;
    println!("quote {} accepted", quote.quote_number);
    Ok(())
}

pub fn refuse(
    store: &mut SqliteStore,
    case_id: Uuid,
    reason: Option<&str>,
    actor: &str,
) -> Result<()> {
    let quote = require_quote(store, &case_id)?;
    let config = store.load_settings()?;
    let notifier = LogNotifier;
    let quote =
        QuoteEngine::new(store, &config, &notifier).refuse(&quote.id, reason, actor, Utc::now())?;
    println!("quote {} refused", quote.quote_number);
    Ok(())
}
