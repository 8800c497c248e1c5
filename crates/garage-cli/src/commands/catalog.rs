//! Catalog, settings and seed commands.

use anyhow::{Context, Result};
use chrono::{Utc, Weekday};
use comfy_table::Table;
use rust_decimal::Decimal;

use garage_core::storage::{GarageStore, NewFault, NewFaultGroup, NewSlot, SqliteStore};

use crate::cli::SettingsSetArgs;
use crate::helpers::parse_time;

pub fn settings_show(store: &SqliteStore) -> Result<()> {
    let config = store.load_settings()?;
    println!("hourly rate:          {}", config.hourly_rate);
    println!("VAT rate:             {}", config.vat_rate);
    println!("quote validity days:  {}", config.quote_validity_days);
    println!("cancel window hours:  {}", config.cancel_window_hours);
    println!("variation threshold:  {}", config.quote_variation_threshold);
    Ok(())
}

pub fn settings_set(store: &mut SqliteStore, args: SettingsSetArgs) -> Result<()> {
    let mut config = store.load_settings()?;
    if let Some(rate) = args.hourly_rate {
        config.hourly_rate = rate;
    }
    if let Some(rate) = args.vat_rate {
        config.vat_rate = rate;
    }
    if let Some(days) = args.validity_days {
        config.quote_validity_days = days;
    }
    if let Some(hours) = args.cancel_window_hours {
        config.cancel_window_hours = hours;
    }
    if let Some(threshold) = args.variation_threshold {
        config.quote_variation_threshold = threshold;
    }
    store.update_settings(&config, Utc::now())?;
    println!("settings updated");
    Ok(())
}

pub fn faults_list(store: &SqliteStore) -> Result<()> {
    let faults = store.list_faults()?;
    let mut table = Table::new();
    table.set_header(["id", "group", "fault", "hours", "parts", "active"]);
    for fault in faults {
        table.add_row([
            fault.id.to_string(),
            fault.group_name,
            fault.name,
            fault.labor_hours.to_string(),
            fault.parts_cost.to_string(),
            if fault.active { "yes" } else { "no" }.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Standard tariff table and weekday slot templates.
pub fn seed(store: &mut SqliteStore) -> Result<()> {
    let groups = [
        ("Engine", 1),
        ("Brakes", 2),
        ("Electrical", 3),
        ("Tyres", 4),
        ("Air conditioning", 5),
    ];
    let faults: &[(&str, &str, &str, &str, &str)] = &[
        ("Engine", "Oil change", "Engine oil and filter replacement", "1.0", "80.00"),
        ("Engine", "Timing belt", "Belt and tensioner replacement", "3.5", "250.00"),
        ("Engine", "Spark plugs", "Replacement of all four spark plugs", "1.0", "60.00"),
        ("Brakes", "Front brake pads", "Front pad replacement", "1.5", "120.00"),
        ("Brakes", "Front brake discs", "Front discs and pads replacement", "2.0", "280.00"),
        ("Brakes", "Rear brake pads", "Rear pad replacement", "1.5", "100.00"),
        ("Electrical", "Battery", "12V battery replacement", "0.5", "150.00"),
        ("Electrical", "Alternator", "Alternator replacement", "2.5", "380.00"),
        ("Electrical", "Starter motor", "Starter motor replacement", "2.0", "320.00"),
        ("Tyres", "Four tyres", "New tyres with balancing", "1.5", "400.00"),
        ("Tyres", "Wheel alignment", "Four-wheel alignment", "1.0", "80.00"),
        ("Air conditioning", "Gas recharge", "Recharge and leak check", "1.0", "120.00"),
        ("Air conditioning", "Cabin filter", "Cabin filter replacement", "0.5", "35.00"),
    ];

    let mut group_ids = std::collections::HashMap::new();
    for (name, order) in groups {
        let group = store.create_fault_group(&NewFaultGroup {
            name: name.to_string(),
            description: None,
            sort_order: order,
        })?;
        group_ids.insert(name, group.id);
    }

    for (group, name, description, hours, parts) in faults {
        store.create_fault(&NewFault {
            group_id: group_ids[group],
            name: name.to_string(),
            description: Some(description.to_string()),
            labor_hours: hours.parse::<Decimal>().context("labor hours")?,
            parts_name: None,
            parts_cost: parts.parse::<Decimal>().context("parts cost")?,
        })?;
    }

    // Monday to Friday, hourly slots 09:00-12:00 and 14:00-17:00
    let now = Utc::now();
    let mut slot_count = 0;
    for weekday in [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ] {
        for start in ["09:00", "10:00", "11:00", "14:00", "15:00", "16:00"] {
            let start_time = parse_time(start)?;
            let end_time = start_time + chrono::Duration::hours(1);
            let slot = NewSlot::recurring(weekday, start_time, end_time)?;
            store.insert_slot(&slot, now)?;
            slot_count += 1;
        }
    }

    println!(
        "seeded {} fault groups, {} faults, {} recurring slots",
        groups.len(),
        faults.len(),
        slot_count
    );
    Ok(())
}
