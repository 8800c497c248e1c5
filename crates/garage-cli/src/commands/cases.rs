//! Case commands.

use anyhow::{anyhow, Result};
use chrono::Utc;
use comfy_table::Table;
use uuid::Uuid;

use garage_core::storage::{Case, CaseFilter, GarageStore, NewCase, SqliteStore};
use garage_core::{CaseWorkflow, LogNotifier};

use crate::helpers::{parse_status, parse_urgency};

pub fn create(
    store: &mut SqliteStore,
    client: Uuid,
    vehicle: Uuid,
    description: String,
    urgency: &str,
) -> Result<()> {
    let urgency = parse_urgency(urgency)?;
    let notifier = LogNotifier;
    let case = CaseWorkflow::new(store, &notifier).create_case(
        NewCase::new(client, vehicle, description).with_urgency(urgency),
        Utc::now(),
    )?;
    println!("created case {} ({})", case.id, case.status);
    Ok(())
}

pub fn list(store: &SqliteStore, status: Option<&str>) -> Result<()> {
    let filter = CaseFilter {
        status: status.map(parse_status).transpose()?,
        ..CaseFilter::default()
    };
    let cases = store.list_cases(&filter)?;

    let mut table = Table::new();
    table.set_header(["id", "status", "urgency", "faults", "description", "created"]);
    for case in cases {
        table.add_row([
            case.id.to_string(),
            case.status.to_string(),
            case.urgency.to_string(),
            case.fault_ids.len().to_string(),
            case.description.chars().take(40).collect(),
            case.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn require_case(store: &SqliteStore, case_id: &Uuid) -> Result<Case> {
    store
        .get_case(case_id)?
        .ok_or_else(|| anyhow!("case {} not found", case_id))
}

pub fn show(store: &SqliteStore, case_id: Uuid, json: bool) -> Result<()> {
    let case = require_case(store, &case_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&case)?);
        return Ok(());
    }
    println!("case:        {}", case.id);
    println!("status:      {}", case.status);
    println!("urgency:     {}", case.urgency);
    println!("client:      {}", case.client_id);
    println!("vehicle:     {}", case.vehicle_id);
    println!("description: {}", case.description);
    println!("faults:      {}", case.fault_ids.len());
    for fault_id in &case.fault_ids {
        println!("  - {}", fault_id);
    }
    if let Some(eta) = case.estimated_completion {
        println!("eta:         {}", eta.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

pub fn add_faults(store: &mut SqliteStore, case_id: Uuid, fault_ids: &[Uuid]) -> Result<()> {
    let notifier = LogNotifier;
    let case = CaseWorkflow::new(store, &notifier).attach_faults(&case_id, fault_ids, Utc::now())?;
    println!("case {} now has {} fault(s)", case.id, case.fault_ids.len());
    Ok(())
}

pub fn remove_fault(store: &mut SqliteStore, case_id: Uuid, fault_id: Uuid) -> Result<()> {
    let notifier = LogNotifier;
    let case = CaseWorkflow::new(store, &notifier).detach_fault(&case_id, &fault_id, Utc::now())?;
    println!("case {} now has {} fault(s)", case.id, case.fault_ids.len());
    Ok(())
}

pub fn set_status(
    store: &mut SqliteStore,
    case_id: Uuid,
    status: &str,
    actor: &str,
    comment: Option<&str>,
) -> Result<()> {
    let target = parse_status(status)?;
    let notifier = LogNotifier;
    let case =
        CaseWorkflow::new(store, &notifier).transition(&case_id, target, actor, comment, Utc::now())?;
    println!("case {} is now {}", case.id, case.status);
    Ok(())
}

pub fn history(store: &SqliteStore, case_id: Uuid) -> Result<()> {
    require_case(store, &case_id)?;
    let logs = store.status_history(&case_id)?;

    let mut table = Table::new();
    table.set_header(["when", "from", "to", "actor", "comment"]);
    for log in logs {
        table.add_row([
            log.changed_at.format("%Y-%m-%d %H:%M").to_string(),
            log.old_status.to_string(),
            log.new_status.to_string(),
            log.actor,
            log.comment.unwrap_or_default(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn expire_overdue(store: &mut SqliteStore) -> Result<()> {
    let notifier = LogNotifier;
    let expired = CaseWorkflow::new(store, &notifier).expire_overdue(Utc::now())?;
    if expired.is_empty() {
        println!("nothing to expire");
    } else {
        for case in expired {
            println!("expired case {}", case.id);
        }
    }
    Ok(())
}
