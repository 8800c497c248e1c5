//! Slot and appointment commands.

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use comfy_table::Table;
use uuid::Uuid;

use garage_core::storage::{AppointmentSlot, GarageStore, NewSlot, SqliteStore};
use garage_core::{AppointmentScheduler, LogNotifier};

use crate::cli::SlotAddArgs;
use crate::helpers::{parse_time, parse_weekday};

fn slot_when(slot: &AppointmentSlot) -> String {
    if slot.exception {
        return format!("closed {}", slot.date.map(|d| d.to_string()).unwrap_or_default());
    }
    match (slot.recurring, slot.weekday, slot.date) {
        (true, Some(weekday), _) => format!("every {}", weekday),
        (false, _, Some(date)) => date.to_string(),
        _ => String::new(),
    }
}

pub fn slots_list(store: &SqliteStore) -> Result<()> {
    let slots = store.list_slots()?;
    let mut table = Table::new();
    table.set_header(["id", "when", "start", "end", "available"]);
    for slot in slots {
        table.add_row([
            slot.id.to_string(),
            slot_when(&slot),
            slot.start_time.format("%H:%M").to_string(),
            slot.end_time.format("%H:%M").to_string(),
            if slot.available { "yes" } else { "no" }.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn slots_available(store: &mut SqliteStore, date: NaiveDate) -> Result<()> {
    let config = store.load_settings()?;
    let notifier = LogNotifier;
    let slots = AppointmentScheduler::new(store, &config, &notifier).available_slots(date)?;
    if slots.is_empty() {
        println!("no availability on {}", date);
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(["id", "start", "end"]);
    for slot in slots {
        table.add_row([
            slot.id.to_string(),
            slot.start_time.format("%H:%M").to_string(),
            slot.end_time.format("%H:%M").to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn slots_add(store: &mut SqliteStore, args: SlotAddArgs) -> Result<()> {
    let start = parse_time(&args.start)?;
    let end = parse_time(&args.end)?;
    let slot = match (args.weekday.as_deref(), args.date) {
        (Some(weekday), None) => NewSlot::recurring(parse_weekday(weekday)?, start, end)?,
        (None, Some(date)) => NewSlot::specific(date, start, end)?,
        _ => bail!("pass exactly one of --weekday or --date"),
    };
    let slot = store.insert_slot(&slot, Utc::now())?;
    println!("added slot {}", slot.id);
    Ok(())
}

pub fn slots_close(store: &mut SqliteStore, date: NaiveDate) -> Result<()> {
    store.insert_slot(&NewSlot::exception(date), Utc::now())?;
    println!("{} marked as closed", date);
    Ok(())
}

pub fn book(
    store: &mut SqliteStore,
    case_id: Uuid,
    date: NaiveDate,
    slot_id: Uuid,
    actor: &str,
) -> Result<()> {
    let config = store.load_settings()?;
    let notifier = LogNotifier;
    let appointment = AppointmentScheduler::new(store, &config, &notifier).book(
        &case_id,
        date,
        &slot_id,
        actor,
        Utc::now(),
    )?;
    println!(
        "booked appointment {} on {} at {}",
        appointment.id,
        appointment.date,
        appointment.start_time.format("%H:%M")
    );
    Ok(())
}

pub fn modify(
    store: &mut SqliteStore,
    appointment_id: Uuid,
    date: NaiveDate,
    slot_id: Uuid,
) -> Result<()> {
    let config = store.load_settings()?;
    let notifier = LogNotifier;
    let appointment = AppointmentScheduler::new(store, &config, &notifier).modify(
        &appointment_id,
        date,
        &slot_id,
        Utc::now(),
    )?;
    println!(
        "appointment {} moved to {} at {}",
        appointment.id,
        appointment.date,
        appointment.start_time.format("%H:%M")
    );
    Ok(())
}

pub fn cancel(
    store: &mut SqliteStore,
    appointment_id: Uuid,
    reason: Option<&str>,
    actor: &str,
) -> Result<()> {
    let config = store.load_settings()?;
    let notifier = LogNotifier;
    let appointment = AppointmentScheduler::new(store, &config, &notifier).cancel(
        &appointment_id,
        reason,
        actor,
        Utc::now(),
    )?;
    println!("appointment {} cancelled", appointment.id);
    Ok(())
}
