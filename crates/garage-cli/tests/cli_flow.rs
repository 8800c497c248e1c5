use std::path::PathBuf;
use std::process::Command;

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use uuid::Uuid;

use garage_core::storage::{CaseStatus, GarageStore, SqliteStore};
use garage_core::{AppointmentScheduler, GarageConfig, NullNotifier};

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_garage"))
}

fn run(db: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(bin())
        .arg("--db")
        .arg(db)
        .args(args)
        .output()
        .expect("binary should run")
}

fn run_ok(db: &std::path::Path, args: &[&str]) -> String {
    let output = run(db, args);
    assert!(
        output.status.success(),
        "command {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Next open-weekday date at least `min_days` ahead, so booking clears the
/// advance rule regardless of when the test runs.
fn next_weekday(min_days: i64) -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(min_days);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date += Duration::days(1);
    }
    date
}

#[test]
fn test_end_to_end_case_flow() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = dir.path().join("garage.db");

    run_ok(&db, &["init"]);
    run_ok(&db, &["seed"]);

    // pull a couple of fault ids straight from the store
    let (fault_a, fault_b) = {
        let store = SqliteStore::open(&db).expect("open");
        let faults = store.list_faults().expect("faults");
        assert_eq!(faults.len(), 13);
        (faults[0].id, faults[1].id)
    };

    let client = Uuid::new_v4().to_string();
    let vehicle = Uuid::new_v4().to_string();
    let stdout = run_ok(
        &db,
        &[
            "case",
            "create",
            "--client",
            &client,
            "--vehicle",
            &vehicle,
            "--description",
            "grinding noise when braking",
            "--urgency",
            "high",
        ],
    );
    assert!(stdout.contains("created case"));

    let case_id = {
        let store = SqliteStore::open(&db).expect("open");
        let cases = store.list_cases(&Default::default()).expect("cases");
        assert_eq!(cases.len(), 1);
        cases[0].id
    };
    let case_arg = case_id.to_string();

    run_ok(
        &db,
        &[
            "case",
            "add-fault",
            &case_arg,
            &fault_a.to_string(),
            &fault_b.to_string(),
        ],
    );

    // quote lifecycle
    let stdout = run_ok(&db, &["quote", "generate", &case_arg]);
    assert!(stdout.contains("DEV-"));
    run_ok(&db, &["quote", "validate", &case_arg]);
    run_ok(&db, &["quote", "accept", &case_arg]);

    {
        let store = SqliteStore::open(&db).expect("open");
        let case = store.get_case(&case_id).expect("get").expect("case");
        assert_eq!(case.status, CaseStatus::QuoteAccepted);
    }

    // book the first available slot a few days out
    let booking_date = next_weekday(3);
    let slot_id = {
        let mut store = SqliteStore::open(&db).expect("open");
        let config = GarageConfig::default();
        let notifier = NullNotifier;
        let slots = AppointmentScheduler::new(&mut store, &config, &notifier)
            .available_slots(booking_date)
            .expect("slots");
        assert!(!slots.is_empty(), "seeded weekday should have open slots");
        slots[0].id
    };
    run_ok(
        &db,
        &[
            "appt",
            "book",
            &case_arg,
            "--date",
            &booking_date.to_string(),
            "--slot",
            &slot_id.to_string(),
        ],
    );

    // repair progresses, then billing
    run_ok(&db, &["case", "set-status", &case_arg, "in_progress"]);
    run_ok(&db, &["case", "set-status", &case_arg, "ready"]);
    run_ok(&db, &["case", "set-status", &case_arg, "closed"]);

    let stdout = run_ok(&db, &["invoice", "generate", &case_arg]);
    assert!(stdout.contains("FAC-"));

    let total = {
        let store = SqliteStore::open(&db).expect("open");
        let invoice = store
            .get_invoice_for_case(&case_id)
            .expect("get")
            .expect("invoice");
        assert!(!invoice.paid);
        invoice.total
    };
    run_ok(
        &db,
        &[
            "invoice",
            "pay",
            &case_arg,
            "--amount",
            &total.to_string(),
            "--method",
            "card",
        ],
    );

    let store = SqliteStore::open(&db).expect("open");
    let invoice = store
        .get_invoice_for_case(&case_id)
        .expect("get")
        .expect("invoice");
    assert!(invoice.paid);

    let history = store.status_history(&case_id).expect("history");
    assert_eq!(history.len(), 6);
}

#[test]
fn test_business_errors_exit_nonzero() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = dir.path().join("garage.db");

    run_ok(&db, &["init"]);
    run_ok(&db, &["seed"]);

    let client = Uuid::new_v4().to_string();
    let vehicle = Uuid::new_v4().to_string();
    run_ok(
        &db,
        &[
            "case", "create", "--client", &client, "--vehicle", &vehicle, "--description", "x",
        ],
    );
    let case_arg = {
        let store = SqliteStore::open(&db).expect("open");
        store.list_cases(&Default::default()).expect("cases")[0]
            .id
            .to_string()
    };

    // quote without faults is a business error, not a crash
    let output = run(&db, &["quote", "generate", &case_arg]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no selected faults"), "stderr: {}", stderr);

    // skipping workflow states is rejected
    let output = run(&db, &["case", "set-status", &case_arg, "closed"]);
    assert!(!output.status.success());

    // double init is refused
    let output = run(&db, &["init"]);
    assert!(!output.status.success());
}
