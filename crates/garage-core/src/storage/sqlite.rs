//! SQLite storage engine.
//!
//! File-backed (or in-memory for tests) `rusqlite` connection behind a
//! mutex. Every multi-row mutation runs in a transaction; the unique
//! indexes on quote/invoice numbers, active appointment slots and the
//! per-case 1:1 documents are the correctness backstop for the checks the
//! engines perform up front.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use rusqlite::{Connection, OptionalExtension, Transaction};
use uuid::Uuid;

use crate::catalog::FaultCatalog;
use crate::config::GarageConfig;
use crate::error::{GarageError, Result};
use crate::numbering::{format_document_number, DocumentKind};
use crate::storage::traits::GarageStore;
use crate::storage::types::{
    Appointment, AppointmentSlot, Case, CaseFilter, CaseStatus, Fault, FaultGroup, Invoice,
    InvoiceLine, LineKind, NewAppointment, NewCase, NewFault, NewFaultGroup, NewPayment, NewSlot,
    Payment, PaymentMethod, PaymentStatus, Quote, QuoteLine, StatusLog, Urgency,
};

/// Attempts for the atomic numbering/booking sections when the database
/// reports busy/locked, before surfacing `Conflict`.
const MAX_BUSY_RETRIES: usize = 3;

const SCHEMA: &str = r#"
CREATE TABLE settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    hourly_rate TEXT NOT NULL,
    vat_rate TEXT NOT NULL,
    quote_validity_days INTEGER NOT NULL,
    cancel_window_hours INTEGER NOT NULL,
    quote_variation_threshold TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE fault_groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE faults (
    id TEXT PRIMARY KEY,
    group_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    labor_hours TEXT NOT NULL,
    parts_name TEXT,
    parts_cost TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,

    UNIQUE(group_id, name),
    FOREIGN KEY(group_id) REFERENCES fault_groups(id)
);

CREATE TABLE cases (
    id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    vehicle_id TEXT NOT NULL,
    description TEXT NOT NULL,
    urgency TEXT NOT NULL,
    status TEXT NOT NULL,
    estimated_completion TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE case_faults (
    case_id TEXT NOT NULL,
    fault_id TEXT NOT NULL,
    position INTEGER NOT NULL,

    PRIMARY KEY (case_id, fault_id),
    FOREIGN KEY(case_id) REFERENCES cases(id),
    FOREIGN KEY(fault_id) REFERENCES faults(id)
);

CREATE TABLE status_logs (
    id TEXT PRIMARY KEY,
    case_id TEXT NOT NULL,
    old_status TEXT NOT NULL,
    new_status TEXT NOT NULL,
    actor TEXT NOT NULL,
    comment TEXT,
    changed_at TEXT NOT NULL,

    FOREIGN KEY(case_id) REFERENCES cases(id)
);

CREATE TABLE doc_sequences (
    kind TEXT NOT NULL,
    year INTEGER NOT NULL,
    last_seq INTEGER NOT NULL,

    PRIMARY KEY (kind, year)
);

CREATE TABLE quotes (
    id TEXT PRIMARY KEY,
    case_id TEXT NOT NULL UNIQUE,
    quote_number TEXT NOT NULL UNIQUE,
    total_labor TEXT NOT NULL,
    total_parts TEXT NOT NULL,
    total_pre_tax TEXT NOT NULL,
    vat_rate TEXT NOT NULL,
    vat_amount TEXT NOT NULL,
    total TEXT NOT NULL,
    validity_date TEXT NOT NULL,
    validated INTEGER NOT NULL DEFAULT 0,
    accepted INTEGER NOT NULL DEFAULT 0,
    refused INTEGER NOT NULL DEFAULT 0,
    refusal_reason TEXT,
    acceptance_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY(case_id) REFERENCES cases(id)
);

CREATE TABLE quote_lines (
    id TEXT PRIMARY KEY,
    quote_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    description TEXT NOT NULL,
    hours TEXT,
    hourly_rate TEXT,
    quantity INTEGER NOT NULL,
    unit_price TEXT NOT NULL,
    line_total TEXT NOT NULL,
    position INTEGER NOT NULL,

    FOREIGN KEY(quote_id) REFERENCES quotes(id)
);

CREATE TABLE slots (
    id TEXT PRIMARY KEY,
    recurring INTEGER NOT NULL,
    weekday INTEGER,
    slot_date TEXT,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    available INTEGER NOT NULL DEFAULT 1,
    exception INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE appointments (
    id TEXT PRIMARY KEY,
    case_id TEXT NOT NULL,
    appt_date TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    cancelled INTEGER NOT NULL DEFAULT 0,
    cancellation_date TEXT,
    cancellation_reason TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY(case_id) REFERENCES cases(id)
);

-- Correctness backstop: one active appointment per (date, start) and per case
CREATE UNIQUE INDEX appointments_active_slot
ON appointments (appt_date, start_time)
WHERE cancelled = 0;

CREATE UNIQUE INDEX appointments_active_case
ON appointments (case_id)
WHERE cancelled = 0;

CREATE TABLE invoices (
    id TEXT PRIMARY KEY,
    case_id TEXT NOT NULL UNIQUE,
    quote_id TEXT NOT NULL,
    invoice_number TEXT NOT NULL UNIQUE,
    total_pre_tax TEXT NOT NULL,
    vat_rate TEXT NOT NULL,
    vat_amount TEXT NOT NULL,
    total TEXT NOT NULL,
    paid INTEGER NOT NULL DEFAULT 0,
    payment_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY(case_id) REFERENCES cases(id),
    FOREIGN KEY(quote_id) REFERENCES quotes(id)
);

CREATE TABLE invoice_lines (
    id TEXT PRIMARY KEY,
    invoice_id TEXT NOT NULL,
    description TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    unit_price TEXT NOT NULL,
    line_total TEXT NOT NULL,
    position INTEGER NOT NULL,

    FOREIGN KEY(invoice_id) REFERENCES invoices(id)
);

CREATE TABLE payments (
    id TEXT PRIMARY KEY,
    invoice_id TEXT NOT NULL,
    amount TEXT NOT NULL,
    method TEXT NOT NULL,
    status TEXT NOT NULL,
    transaction_ref TEXT,
    created_at TEXT NOT NULL,
    completed_at TEXT,

    FOREIGN KEY(invoice_id) REFERENCES invoices(id)
);
"#;

/// SQLite-backed garage store.
pub struct SqliteStore {
    #[allow(dead_code)]
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new database at `path`, seeding the settings row from
    /// `config`. Fails if the file already exists.
    pub fn create(path: &Path, config: &GarageConfig) -> Result<Self> {
        if path.exists() {
            return Err(GarageError::Storage(
                "database file already exists".to_string(),
            ));
        }
        let conn = Connection::open(path)?;
        Self::init(conn, config).map(|store| Self {
            path: Some(path.to_path_buf()),
            ..store
        })
    }

    /// Open an existing database.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GarageError::NotFound(format!(
                "database file {}",
                path.display()
            )));
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by the test suites.
    pub fn in_memory(config: &GarageConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, config)
    }

    fn init(conn: Connection, config: &GarageConfig) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            r#"
            INSERT INTO settings (
                id, hourly_rate, vat_rate, quote_validity_days,
                cancel_window_hours, quote_variation_threshold, updated_at
            )
            VALUES (1, ?, ?, ?, ?, ?, ?)
            "#,
            (
                config.hourly_rate.to_string(),
                config.vat_rate.to_string(),
                config.quote_validity_days,
                config.cancel_window_hours,
                config.quote_variation_threshold.to_string(),
                Utc::now().to_rfc3339(),
            ),
        )?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GarageError::Storage("SQLite connection poisoned".to_string()))
    }

    /// Consistency sweep over the invariants the schema cannot express.
    pub fn check_integrity(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        if rows.next()?.is_some() {
            return Err(GarageError::Storage(
                "foreign key integrity check failed".to_string(),
            ));
        }

        let settings_rows: i64 = conn.query_row("SELECT COUNT(*) FROM settings", [], |row| {
            row.get(0)
        })?;
        if settings_rows != 1 {
            return Err(GarageError::Storage(format!(
                "expected exactly one settings row, found {}",
                settings_rows
            )));
        }

        let orphan_lines: i64 = conn.query_row(
            "SELECT COUNT(*) FROM quote_lines ql LEFT JOIN quotes q ON q.id = ql.quote_id WHERE q.id IS NULL",
            [],
            |row| row.get(0),
        )?;
        if orphan_lines > 0 {
            return Err(GarageError::Storage(
                "quote lines reference missing quotes".to_string(),
            ));
        }

        Ok(())
    }
}

// --- Column codec helpers ---

fn dec_from_sql(value: &str) -> Result<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| GarageError::Storage(format!("invalid decimal in database: {}", e)))
}

fn dec_opt_from_sql(value: Option<String>) -> Result<Option<Decimal>> {
    value.as_deref().map(dec_from_sql).transpose()
}

fn uuid_from_sql(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| GarageError::Storage(format!("invalid UUID: {}", e)))
}

fn datetime_from_sql(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GarageError::Storage(format!("invalid timestamp: {}", e)))
}

fn datetime_opt_from_sql(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(datetime_from_sql).transpose()
}

fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn date_from_sql(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| GarageError::Storage(format!("invalid date: {}", e)))
}

fn time_to_sql(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

fn time_from_sql(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .map_err(|e| GarageError::Storage(format!("invalid time: {}", e)))
}

fn weekday_to_sql(weekday: Weekday) -> i64 {
    weekday.num_days_from_monday() as i64
}

fn weekday_from_sql(value: i64) -> Result<Weekday> {
    match value {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(GarageError::Storage(format!(
            "invalid weekday in database: {}",
            other
        ))),
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

fn is_unique_violation(err: &rusqlite::Error, needle: &str) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains(needle)
    )
}

/// Bump the (kind, year) counter inside the caller's transaction. One
/// upsert statement; never read-max-then-write.
fn bump_sequence(tx: &Transaction<'_>, kind: DocumentKind, year: i32) -> Result<i64> {
    let seq: i64 = tx.query_row(
        r#"
        INSERT INTO doc_sequences (kind, year, last_seq) VALUES (?, ?, 1)
        ON CONFLICT(kind, year) DO UPDATE SET last_seq = last_seq + 1
        RETURNING last_seq
        "#,
        (kind.prefix(), year),
        |row| row.get(0),
    )?;
    Ok(seq)
}

// --- Row mapping ---

struct CaseRow {
    id: String,
    client_id: String,
    vehicle_id: String,
    description: String,
    urgency: String,
    status: String,
    estimated_completion: Option<String>,
    created_at: String,
    updated_at: String,
}

impl CaseRow {
    const COLUMNS: &'static str =
        "id, client_id, vehicle_id, description, urgency, status, estimated_completion, created_at, updated_at";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            client_id: row.get(1)?,
            vehicle_id: row.get(2)?,
            description: row.get(3)?,
            urgency: row.get(4)?,
            status: row.get(5)?,
            estimated_completion: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_case(self, fault_ids: Vec<Uuid>) -> Result<Case> {
        Ok(Case {
            id: uuid_from_sql(&self.id)?,
            client_id: uuid_from_sql(&self.client_id)?,
            vehicle_id: uuid_from_sql(&self.vehicle_id)?,
            description: self.description,
            urgency: Urgency::parse(&self.urgency)?,
            status: CaseStatus::parse(&self.status)?,
            fault_ids,
            estimated_completion: datetime_opt_from_sql(self.estimated_completion)?,
            created_at: datetime_from_sql(&self.created_at)?,
            updated_at: datetime_from_sql(&self.updated_at)?,
        })
    }
}

struct QuoteRow {
    id: String,
    case_id: String,
    quote_number: String,
    total_labor: String,
    total_parts: String,
    total_pre_tax: String,
    vat_rate: String,
    vat_amount: String,
    total: String,
    validity_date: String,
    validated: bool,
    accepted: bool,
    refused: bool,
    refusal_reason: Option<String>,
    acceptance_date: Option<String>,
    created_at: String,
    updated_at: String,
}

impl QuoteRow {
    const COLUMNS: &'static str = "id, case_id, quote_number, total_labor, total_parts, \
         total_pre_tax, vat_rate, vat_amount, total, validity_date, validated, accepted, \
         refused, refusal_reason, acceptance_date, created_at, updated_at";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            case_id: row.get(1)?,
            quote_number: row.get(2)?,
            total_labor: row.get(3)?,
            total_parts: row.get(4)?,
            total_pre_tax: row.get(5)?,
            vat_rate: row.get(6)?,
            vat_amount: row.get(7)?,
            total: row.get(8)?,
            validity_date: row.get(9)?,
            validated: row.get(10)?,
            accepted: row.get(11)?,
            refused: row.get(12)?,
            refusal_reason: row.get(13)?,
            acceptance_date: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn into_quote(self, lines: Vec<QuoteLine>) -> Result<Quote> {
        Ok(Quote {
            id: uuid_from_sql(&self.id)?,
            case_id: uuid_from_sql(&self.case_id)?,
            quote_number: self.quote_number,
            lines,
            total_labor: dec_from_sql(&self.total_labor)?,
            total_parts: dec_from_sql(&self.total_parts)?,
            total_pre_tax: dec_from_sql(&self.total_pre_tax)?,
            vat_rate: dec_from_sql(&self.vat_rate)?,
            vat_amount: dec_from_sql(&self.vat_amount)?,
            total: dec_from_sql(&self.total)?,
            validity_date: date_from_sql(&self.validity_date)?,
            validated: self.validated,
            accepted: self.accepted,
            refused: self.refused,
            refusal_reason: self.refusal_reason,
            acceptance_date: datetime_opt_from_sql(self.acceptance_date)?,
            created_at: datetime_from_sql(&self.created_at)?,
            updated_at: datetime_from_sql(&self.updated_at)?,
        })
    }
}

fn appointment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<
    (String, String, String, String, String, bool, Option<String>, Option<String>, String, String),
> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

const APPOINTMENT_COLUMNS: &str = "id, case_id, appt_date, start_time, end_time, cancelled, \
     cancellation_date, cancellation_reason, created_at, updated_at";

#[allow(clippy::type_complexity)]
fn decode_appointment(
    row: (String, String, String, String, String, bool, Option<String>, Option<String>, String, String),
) -> Result<Appointment> {
    let (id, case_id, date, start, end, cancelled, cancel_date, cancel_reason, created, updated) =
        row;
    Ok(Appointment {
        id: uuid_from_sql(&id)?,
        case_id: uuid_from_sql(&case_id)?,
        date: date_from_sql(&date)?,
        start_time: time_from_sql(&start)?,
        end_time: time_from_sql(&end)?,
        cancelled,
        cancellation_date: datetime_opt_from_sql(cancel_date)?,
        cancellation_reason: cancel_reason,
        created_at: datetime_from_sql(&created)?,
        updated_at: datetime_from_sql(&updated)?,
    })
}

const SLOT_COLUMNS: &str =
    "id, recurring, weekday, slot_date, start_time, end_time, available, exception, created_at";

fn slot_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<
    (String, bool, Option<i64>, Option<String>, String, String, bool, bool, String),
> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

#[allow(clippy::type_complexity)]
fn decode_slot(
    row: (String, bool, Option<i64>, Option<String>, String, String, bool, bool, String),
) -> Result<AppointmentSlot> {
    let (id, recurring, weekday, date, start, end, available, exception, created_at) = row;
    Ok(AppointmentSlot {
        id: uuid_from_sql(&id)?,
        recurring,
        weekday: weekday.map(weekday_from_sql).transpose()?,
        date: date.as_deref().map(date_from_sql).transpose()?,
        start_time: time_from_sql(&start)?,
        end_time: time_from_sql(&end)?,
        available,
        exception,
        created_at: datetime_from_sql(&created_at)?,
    })
}

fn load_quote_lines(conn: &Connection, quote_id: &str) -> Result<Vec<QuoteLine>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, kind, description, hours, hourly_rate, quantity, unit_price, line_total
        FROM quote_lines
        WHERE quote_id = ?
        ORDER BY position
        "#,
    )?;
    let rows = stmt.query_map([quote_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut lines = Vec::new();
    for row in rows {
        let (id, kind, description, hours, hourly_rate, quantity, unit_price, line_total) = row?;
        lines.push(QuoteLine {
            id: uuid_from_sql(&id)?,
            kind: LineKind::parse(&kind)?,
            description,
            hours: dec_opt_from_sql(hours)?,
            hourly_rate: dec_opt_from_sql(hourly_rate)?,
            quantity,
            unit_price: dec_from_sql(&unit_price)?,
            line_total: dec_from_sql(&line_total)?,
        });
    }
    Ok(lines)
}

fn insert_quote_lines(tx: &Transaction<'_>, quote_id: &str, lines: &[QuoteLine]) -> Result<()> {
    for (position, line) in lines.iter().enumerate() {
        tx.execute(
            r#"
            INSERT INTO quote_lines (
                id, quote_id, kind, description, hours, hourly_rate,
                quantity, unit_price, line_total, position
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            (
                line.id.to_string(),
                quote_id,
                line.kind.as_str(),
                &line.description,
                line.hours.map(|d| d.to_string()),
                line.hourly_rate.map(|d| d.to_string()),
                line.quantity,
                line.unit_price.to_string(),
                line.line_total.to_string(),
                position as i64,
            ),
        )?;
    }
    Ok(())
}

fn load_invoice_lines(conn: &Connection, invoice_id: &str) -> Result<Vec<InvoiceLine>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, description, quantity, unit_price, line_total
        FROM invoice_lines
        WHERE invoice_id = ?
        ORDER BY position
        "#,
    )?;
    let rows = stmt.query_map([invoice_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut lines = Vec::new();
    for row in rows {
        let (id, description, quantity, unit_price, line_total) = row?;
        lines.push(InvoiceLine {
            id: uuid_from_sql(&id)?,
            description,
            quantity,
            unit_price: dec_from_sql(&unit_price)?,
            line_total: dec_from_sql(&line_total)?,
        });
    }
    Ok(lines)
}

fn case_fault_ids(conn: &Connection, case_id: &str) -> Result<Vec<Uuid>> {
    let mut stmt = conn
        .prepare("SELECT fault_id FROM case_faults WHERE case_id = ? ORDER BY position")?;
    let rows = stmt.query_map([case_id], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(uuid_from_sql(&row?)?);
    }
    Ok(ids)
}

fn fault_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<
    (String, String, String, String, Option<String>, String, Option<String>, String, bool),
> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

const FAULT_COLUMNS: &str = "f.id, f.group_id, g.name, f.name, f.description, f.labor_hours, \
     f.parts_name, f.parts_cost, f.active";

#[allow(clippy::type_complexity)]
fn decode_fault(
    row: (String, String, String, String, Option<String>, String, Option<String>, String, bool),
) -> Result<Fault> {
    let (id, group_id, group_name, name, description, labor_hours, parts_name, parts_cost, active) =
        row;
    Ok(Fault {
        id: uuid_from_sql(&id)?,
        group_id: uuid_from_sql(&group_id)?,
        group_name,
        name,
        description,
        labor_hours: dec_from_sql(&labor_hours)?,
        parts_name,
        parts_cost: dec_from_sql(&parts_cost)?,
        active,
    })
}

fn payment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<
    (String, String, String, String, String, Option<String>, String, Option<String>),
> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

const PAYMENT_COLUMNS: &str =
    "id, invoice_id, amount, method, status, transaction_ref, created_at, completed_at";

#[allow(clippy::type_complexity)]
fn decode_payment(
    row: (String, String, String, String, String, Option<String>, String, Option<String>),
) -> Result<Payment> {
    let (id, invoice_id, amount, method, status, transaction_ref, created_at, completed_at) = row;
    Ok(Payment {
        id: uuid_from_sql(&id)?,
        invoice_id: uuid_from_sql(&invoice_id)?,
        amount: dec_from_sql(&amount)?,
        method: PaymentMethod::parse(&method)?,
        status: PaymentStatus::parse(&status)?,
        transaction_ref,
        created_at: datetime_from_sql(&created_at)?,
        completed_at: datetime_opt_from_sql(completed_at)?,
    })
}

impl GarageStore for SqliteStore {
    fn load_settings(&self) -> Result<GarageConfig> {
        let conn = self.lock_conn()?;
        let row = conn.query_row(
            r#"
            SELECT hourly_rate, vat_rate, quote_validity_days,
                   cancel_window_hours, quote_variation_threshold
            FROM settings WHERE id = 1
            "#,
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;
        Ok(GarageConfig {
            hourly_rate: dec_from_sql(&row.0)?,
            vat_rate: dec_from_sql(&row.1)?,
            quote_validity_days: row.2,
            cancel_window_hours: row.3,
            quote_variation_threshold: dec_from_sql(&row.4)?,
        })
    }

    fn update_settings(&mut self, config: &GarageConfig, at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            UPDATE settings SET
                hourly_rate = ?, vat_rate = ?, quote_validity_days = ?,
                cancel_window_hours = ?, quote_variation_threshold = ?, updated_at = ?
            WHERE id = 1
            "#,
            (
                config.hourly_rate.to_string(),
                config.vat_rate.to_string(),
                config.quote_validity_days,
                config.cancel_window_hours,
                config.quote_variation_threshold.to_string(),
                at.to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    fn create_fault_group(&mut self, group: &NewFaultGroup) -> Result<FaultGroup> {
        let conn = self.lock_conn()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO fault_groups (id, name, description, sort_order) VALUES (?, ?, ?, ?)",
            (
                id.to_string(),
                &group.name,
                &group.description,
                group.sort_order,
            ),
        )
        .map_err(|e| {
            if is_unique_violation(&e, "fault_groups.name") {
                GarageError::Validation(format!("fault group '{}' already exists", group.name))
            } else {
                e.into()
            }
        })?;
        Ok(FaultGroup {
            id,
            name: group.name.clone(),
            description: group.description.clone(),
            sort_order: group.sort_order,
        })
    }

    fn create_fault(&mut self, fault: &NewFault) -> Result<Fault> {
        let conn = self.lock_conn()?;
        let group_name: Option<String> = conn
            .query_row(
                "SELECT name FROM fault_groups WHERE id = ?",
                [fault.group_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let group_name = group_name.ok_or_else(|| {
            GarageError::NotFound(format!("fault group {}", fault.group_id))
        })?;

        let id = Uuid::new_v4();
        conn.execute(
            r#"
            INSERT INTO faults (id, group_id, name, description, labor_hours, parts_name, parts_cost, active)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1)
            "#,
            (
                id.to_string(),
                fault.group_id.to_string(),
                &fault.name,
                &fault.description,
                fault.labor_hours.to_string(),
                &fault.parts_name,
                fault.parts_cost.to_string(),
            ),
        )
        .map_err(|e| {
            if is_unique_violation(&e, "faults.group_id") {
                GarageError::Validation(format!("fault '{}' already exists in group", fault.name))
            } else {
                e.into()
            }
        })?;
        Ok(Fault {
            id,
            group_id: fault.group_id,
            group_name,
            name: fault.name.clone(),
            description: fault.description.clone(),
            labor_hours: fault.labor_hours,
            parts_name: fault.parts_name.clone(),
            parts_cost: fault.parts_cost,
            active: true,
        })
    }

    fn list_fault_groups(&self) -> Result<Vec<FaultGroup>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, sort_order FROM fault_groups ORDER BY sort_order, name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        let mut groups = Vec::new();
        for row in rows {
            let (id, name, description, sort_order) = row?;
            groups.push(FaultGroup {
                id: uuid_from_sql(&id)?,
                name,
                description,
                sort_order,
            });
        }
        Ok(groups)
    }

    fn list_faults(&self) -> Result<Vec<Fault>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM faults f JOIN fault_groups g ON g.id = f.group_id \
             ORDER BY g.sort_order, g.name, f.name",
            FAULT_COLUMNS
        ))?;
        let rows = stmt.query_map([], fault_from_row)?;
        let mut faults = Vec::new();
        for row in rows {
            faults.push(decode_fault(row?)?);
        }
        Ok(faults)
    }

    fn set_fault_active(&mut self, id: &Uuid, active: bool) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE faults SET active = ? WHERE id = ?",
            (active, id.to_string()),
        )?;
        if changed == 0 {
            return Err(GarageError::NotFound(format!("fault {}", id)));
        }
        Ok(())
    }

    fn insert_case(&mut self, case: &NewCase, at: DateTime<Utc>) -> Result<Case> {
        let conn = self.lock_conn()?;
        let id = Uuid::new_v4();
        let at_str = at.to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO cases (id, client_id, vehicle_id, description, urgency, status,
                               estimated_completion, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
            (
                id.to_string(),
                case.client_id.to_string(),
                case.vehicle_id.to_string(),
                &case.description,
                case.urgency.as_str(),
                CaseStatus::New.as_str(),
                &at_str,
                &at_str,
            ),
        )?;
        Ok(Case {
            id,
            client_id: case.client_id,
            vehicle_id: case.vehicle_id,
            description: case.description.clone(),
            urgency: case.urgency,
            status: CaseStatus::New,
            fault_ids: Vec::new(),
            estimated_completion: None,
            created_at: at,
            updated_at: at,
        })
    }

    fn get_case(&self, id: &Uuid) -> Result<Option<Case>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM cases WHERE id = ?", CaseRow::COLUMNS),
            [id.to_string()],
            CaseRow::from_row,
        );
        match result {
            Ok(row) => {
                let fault_ids = case_fault_ids(&conn, &row.id)?;
                Ok(Some(row.into_case(fault_ids)?))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>> {
        let conn = self.lock_conn()?;

        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(client_id) = filter.client_id {
            conditions.push("client_id = ?".to_string());
            params.push(Box::new(client_id.to_string()));
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?".to_string());
            params.push(Box::new(status.as_str().to_string()));
        }
        if let Some(urgency) = filter.urgency {
            conditions.push("urgency = ?".to_string());
            params.push(Box::new(urgency.as_str().to_string()));
        }

        let mut query = format!("SELECT {} FROM cases", CaseRow::COLUMNS);
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            query.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), CaseRow::from_row)?;

        let mut case_rows = Vec::new();
        for row in rows {
            case_rows.push(row?);
        }
        let mut cases = Vec::new();
        for row in case_rows {
            let fault_ids = case_fault_ids(&conn, &row.id)?;
            cases.push(row.into_case(fault_ids)?);
        }
        Ok(cases)
    }

    fn set_case_faults(
        &mut self,
        case_id: &Uuid,
        fault_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE cases SET updated_at = ? WHERE id = ?",
            (at.to_rfc3339(), case_id.to_string()),
        )?;
        if changed == 0 {
            return Err(GarageError::NotFound(format!("case {}", case_id)));
        }

        tx.execute(
            "DELETE FROM case_faults WHERE case_id = ?",
            [case_id.to_string()],
        )?;
        for (position, fault_id) in fault_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO case_faults (case_id, fault_id, position) VALUES (?, ?, ?)",
                (case_id.to_string(), fault_id.to_string(), position as i64),
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn set_case_estimated_completion(
        &mut self,
        case_id: &Uuid,
        eta: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE cases SET estimated_completion = ?, updated_at = ? WHERE id = ?",
            (
                eta.map(|dt| dt.to_rfc3339()),
                at.to_rfc3339(),
                case_id.to_string(),
            ),
        )?;
        if changed == 0 {
            return Err(GarageError::NotFound(format!("case {}", case_id)));
        }
        Ok(())
    }

    fn transition_case(
        &mut self,
        case_id: &Uuid,
        old: CaseStatus,
        new: CaseStatus,
        actor: &str,
        comment: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<StatusLog> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        // Compare-and-set; a racing transition loses here, not in the log.
        let changed = tx.execute(
            "UPDATE cases SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            (
                new.as_str(),
                at.to_rfc3339(),
                case_id.to_string(),
                old.as_str(),
            ),
        )?;
        if changed == 0 {
            let exists: Option<String> = tx
                .query_row(
                    "SELECT id FROM cases WHERE id = ?",
                    [case_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match exists {
                Some(_) => GarageError::Conflict,
                None => GarageError::NotFound(format!("case {}", case_id)),
            });
        }

        let log = StatusLog {
            id: Uuid::new_v4(),
            case_id: *case_id,
            old_status: old,
            new_status: new,
            actor: actor.to_string(),
            comment: comment.map(|c| c.to_string()),
            changed_at: at,
        };
        tx.execute(
            r#"
            INSERT INTO status_logs (id, case_id, old_status, new_status, actor, comment, changed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            (
                log.id.to_string(),
                log.case_id.to_string(),
                log.old_status.as_str(),
                log.new_status.as_str(),
                &log.actor,
                &log.comment,
                log.changed_at.to_rfc3339(),
            ),
        )?;

        tx.commit()?;
        Ok(log)
    }

    fn status_history(&self, case_id: &Uuid) -> Result<Vec<StatusLog>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, case_id, old_status, new_status, actor, comment, changed_at
            FROM status_logs
            WHERE case_id = ?
            ORDER BY changed_at
            "#,
        )?;
        let rows = stmt.query_map([case_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut logs = Vec::new();
        for row in rows {
            let (id, case_id, old_status, new_status, actor, comment, changed_at) = row?;
            logs.push(StatusLog {
                id: uuid_from_sql(&id)?,
                case_id: uuid_from_sql(&case_id)?,
                old_status: CaseStatus::parse(&old_status)?,
                new_status: CaseStatus::parse(&new_status)?,
                actor,
                comment,
                changed_at: datetime_from_sql(&changed_at)?,
            });
        }
        Ok(logs)
    }

    fn next_document_number(&mut self, kind: DocumentKind, year: i32) -> Result<String> {
        let mut conn = self.lock_conn()?;
        let mut attempt = 0;
        loop {
            let result = (|| -> Result<i64> {
                let tx = conn.transaction()?;
                let seq = bump_sequence(&tx, kind, year)?;
                tx.commit()?;
                Ok(seq)
            })();
            match result {
                Ok(seq) => return Ok(format_document_number(kind, year, seq)),
                Err(GarageError::Conflict) if attempt < MAX_BUSY_RETRIES => attempt += 1,
                Err(err) => return Err(err),
            }
        }
    }

    fn insert_quote(&mut self, quote: &Quote) -> Result<Quote> {
        let mut conn = self.lock_conn()?;
        let mut attempt = 0;
        loop {
            match insert_quote_tx(&mut conn, quote) {
                Err(GarageError::Conflict) if attempt < MAX_BUSY_RETRIES => attempt += 1,
                result => return result,
            }
        }
    }

    fn get_quote(&self, id: &Uuid) -> Result<Option<Quote>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM quotes WHERE id = ?", QuoteRow::COLUMNS),
            [id.to_string()],
            QuoteRow::from_row,
        );
        match result {
            Ok(row) => {
                let lines = load_quote_lines(&conn, &row.id)?;
                Ok(Some(row.into_quote(lines)?))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_quote_for_case(&self, case_id: &Uuid) -> Result<Option<Quote>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM quotes WHERE case_id = ?", QuoteRow::COLUMNS),
            [case_id.to_string()],
            QuoteRow::from_row,
        );
        match result {
            Ok(row) => {
                let lines = load_quote_lines(&conn, &row.id)?;
                Ok(Some(row.into_quote(lines)?))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn update_quote_lines(&mut self, quote: &Quote) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            r#"
            UPDATE quotes SET
                total_labor = ?, total_parts = ?, total_pre_tax = ?,
                vat_rate = ?, vat_amount = ?, total = ?, updated_at = ?
            WHERE id = ?
            "#,
            (
                quote.total_labor.to_string(),
                quote.total_parts.to_string(),
                quote.total_pre_tax.to_string(),
                quote.vat_rate.to_string(),
                quote.vat_amount.to_string(),
                quote.total.to_string(),
                quote.updated_at.to_rfc3339(),
                quote.id.to_string(),
            ),
        )?;
        if changed == 0 {
            return Err(GarageError::NotFound(format!("quote {}", quote.id)));
        }

        let quote_id = quote.id.to_string();
        tx.execute("DELETE FROM quote_lines WHERE quote_id = ?", [&quote_id])?;
        insert_quote_lines(&tx, &quote_id, &quote.lines)?;

        tx.commit()?;
        Ok(())
    }

    fn set_quote_flags(&mut self, quote: &Quote) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE quotes SET
                validated = ?, accepted = ?, refused = ?,
                refusal_reason = ?, acceptance_date = ?, updated_at = ?
            WHERE id = ?
            "#,
            (
                quote.validated,
                quote.accepted,
                quote.refused,
                &quote.refusal_reason,
                quote.acceptance_date.map(|dt| dt.to_rfc3339()),
                quote.updated_at.to_rfc3339(),
                quote.id.to_string(),
            ),
        )?;
        if changed == 0 {
            return Err(GarageError::NotFound(format!("quote {}", quote.id)));
        }
        Ok(())
    }

    fn insert_slot(&mut self, slot: &NewSlot, at: DateTime<Utc>) -> Result<AppointmentSlot> {
        let conn = self.lock_conn()?;
        let id = Uuid::new_v4();
        conn.execute(
            r#"
            INSERT INTO slots (id, recurring, weekday, slot_date, start_time, end_time,
                               available, exception, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            (
                id.to_string(),
                slot.recurring,
                slot.weekday.map(weekday_to_sql),
                slot.date.map(date_to_sql),
                time_to_sql(slot.start_time),
                time_to_sql(slot.end_time),
                slot.available,
                slot.exception,
                at.to_rfc3339(),
            ),
        )?;
        Ok(AppointmentSlot {
            id,
            recurring: slot.recurring,
            weekday: slot.weekday,
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            available: slot.available,
            exception: slot.exception,
            created_at: at,
        })
    }

    fn list_slots(&self) -> Result<Vec<AppointmentSlot>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM slots ORDER BY recurring DESC, weekday, slot_date, start_time",
            SLOT_COLUMNS
        ))?;
        let rows = stmt.query_map([], slot_from_row)?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(decode_slot(row?)?);
        }
        Ok(slots)
    }

    fn slots_for_date(&self, date: NaiveDate) -> Result<Vec<AppointmentSlot>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM slots
            WHERE exception = 0 AND available = 1
              AND ((recurring = 1 AND weekday = ?) OR (recurring = 0 AND slot_date = ?))
            ORDER BY start_time
            "#,
            SLOT_COLUMNS
        ))?;
        let rows = stmt.query_map(
            (weekday_to_sql(date.weekday()), date_to_sql(date)),
            slot_from_row,
        )?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(decode_slot(row?)?);
        }
        Ok(slots)
    }

    fn has_exception(&self, date: NaiveDate) -> Result<bool> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM slots WHERE exception = 1 AND slot_date = ?",
            [date_to_sql(date)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn appointment_booked(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        exclude: Option<&Uuid>,
    ) -> Result<bool> {
        let conn = self.lock_conn()?;
        let count: i64 = match exclude {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM appointments \
                 WHERE cancelled = 0 AND appt_date = ? AND start_time = ? AND id != ?",
                (date_to_sql(date), time_to_sql(start), id.to_string()),
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM appointments \
                 WHERE cancelled = 0 AND appt_date = ? AND start_time = ?",
                (date_to_sql(date), time_to_sql(start)),
                |row| row.get(0),
            )?,
        };
        Ok(count > 0)
    }

    fn insert_appointment(
        &mut self,
        appointment: &NewAppointment,
        at: DateTime<Utc>,
    ) -> Result<Appointment> {
        let conn = self.lock_conn()?;
        let id = Uuid::new_v4();
        let at_str = at.to_rfc3339();

        let mut attempt = 0;
        loop {
            let result = conn.execute(
                r#"
                INSERT INTO appointments (id, case_id, appt_date, start_time, end_time,
                                          cancelled, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, 0, ?, ?)
                "#,
                (
                    id.to_string(),
                    appointment.case_id.to_string(),
                    date_to_sql(appointment.date),
                    time_to_sql(appointment.start_time),
                    time_to_sql(appointment.end_time),
                    &at_str,
                    &at_str,
                ),
            );
            match result {
                Ok(_) => break,
                Err(e) if is_unique_violation(&e, "case_id") => {
                    return Err(GarageError::Conflict);
                }
                Err(e) if is_unique_violation(&e, "appointments") => {
                    return Err(GarageError::SlotTaken);
                }
                Err(e) if is_busy(&e) && attempt < MAX_BUSY_RETRIES => {
                    attempt += 1;
                }
                Err(e) if is_busy(&e) => return Err(GarageError::Conflict),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Appointment {
            id,
            case_id: appointment.case_id,
            date: appointment.date,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            cancelled: false,
            cancellation_date: None,
            cancellation_reason: None,
            created_at: at,
            updated_at: at,
        })
    }

    fn get_appointment(&self, id: &Uuid) -> Result<Option<Appointment>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            &format!(
                "SELECT {} FROM appointments WHERE id = ?",
                APPOINTMENT_COLUMNS
            ),
            [id.to_string()],
            appointment_from_row,
        );
        match result {
            Ok(row) => Ok(Some(decode_appointment(row)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn active_appointment_for_case(&self, case_id: &Uuid) -> Result<Option<Appointment>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            &format!(
                "SELECT {} FROM appointments WHERE case_id = ? AND cancelled = 0",
                APPOINTMENT_COLUMNS
            ),
            [case_id.to_string()],
            appointment_from_row,
        );
        match result {
            Ok(row) => Ok(Some(decode_appointment(row)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn reschedule_appointment(
        &mut self,
        id: &Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        at: DateTime<Utc>,
    ) -> Result<Appointment> {
        let conn = self.lock_conn()?;
        let result = conn.execute(
            r#"
            UPDATE appointments SET appt_date = ?, start_time = ?, end_time = ?, updated_at = ?
            WHERE id = ? AND cancelled = 0
            "#,
            (
                date_to_sql(date),
                time_to_sql(start),
                time_to_sql(end),
                at.to_rfc3339(),
                id.to_string(),
            ),
        );
        let changed = match result {
            Ok(n) => n,
            Err(e) if is_unique_violation(&e, "appointments") => {
                return Err(GarageError::SlotTaken);
            }
            Err(e) => return Err(e.into()),
        };
        if changed == 0 {
            return Err(GarageError::NotFound(format!("active appointment {}", id)));
        }

        let row = conn.query_row(
            &format!(
                "SELECT {} FROM appointments WHERE id = ?",
                APPOINTMENT_COLUMNS
            ),
            [id.to_string()],
            appointment_from_row,
        )?;
        decode_appointment(row)
    }

    fn cancel_appointment(
        &mut self,
        id: &Uuid,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Appointment> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE appointments SET cancelled = 1, cancellation_date = ?,
                                    cancellation_reason = ?, updated_at = ?
            WHERE id = ? AND cancelled = 0
            "#,
            (
                at.to_rfc3339(),
                reason,
                at.to_rfc3339(),
                id.to_string(),
            ),
        )?;
        if changed == 0 {
            return Err(GarageError::NotFound(format!("active appointment {}", id)));
        }

        let row = conn.query_row(
            &format!(
                "SELECT {} FROM appointments WHERE id = ?",
                APPOINTMENT_COLUMNS
            ),
            [id.to_string()],
            appointment_from_row,
        )?;
        decode_appointment(row)
    }

    fn insert_invoice(&mut self, invoice: &Invoice) -> Result<Invoice> {
        let mut conn = self.lock_conn()?;
        let mut attempt = 0;
        loop {
            match insert_invoice_tx(&mut conn, invoice) {
                Err(GarageError::Conflict) if attempt < MAX_BUSY_RETRIES => attempt += 1,
                result => return result,
            }
        }
    }

    fn get_invoice(&self, id: &Uuid) -> Result<Option<Invoice>> {
        let conn = self.lock_conn()?;
        load_invoice(&conn, "id", &id.to_string())
    }

    fn get_invoice_for_case(&self, case_id: &Uuid) -> Result<Option<Invoice>> {
        let conn = self.lock_conn()?;
        load_invoice(&conn, "case_id", &case_id.to_string())
    }

    fn insert_payment(&mut self, payment: &NewPayment, at: DateTime<Utc>) -> Result<Payment> {
        let conn = self.lock_conn()?;

        let invoice_exists: Option<String> = conn
            .query_row(
                "SELECT id FROM invoices WHERE id = ?",
                [payment.invoice_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if invoice_exists.is_none() {
            return Err(GarageError::NotFound(format!(
                "invoice {}",
                payment.invoice_id
            )));
        }

        let id = Uuid::new_v4();
        conn.execute(
            r#"
            INSERT INTO payments (id, invoice_id, amount, method, status, transaction_ref,
                                  created_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
            (
                id.to_string(),
                payment.invoice_id.to_string(),
                payment.amount.to_string(),
                payment.method.as_str(),
                PaymentStatus::Pending.as_str(),
                &payment.transaction_ref,
                at.to_rfc3339(),
            ),
        )?;
        Ok(Payment {
            id,
            invoice_id: payment.invoice_id,
            amount: payment.amount,
            method: payment.method,
            status: PaymentStatus::Pending,
            transaction_ref: payment.transaction_ref.clone(),
            created_at: at,
            completed_at: None,
        })
    }

    fn complete_payment(&mut self, payment_id: &Uuid, at: DateTime<Utc>) -> Result<Payment> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let row = tx
            .query_row(
                &format!(
                    "SELECT {} FROM payments WHERE id = ?",
                    PAYMENT_COLUMNS
                ),
                [payment_id.to_string()],
                payment_from_row,
            )
            .optional()?;
        let payment = match row {
            Some(row) => decode_payment(row)?,
            None => return Err(GarageError::NotFound(format!("payment {}", payment_id))),
        };
        if payment.status != PaymentStatus::Pending {
            return Err(GarageError::Validation(format!(
                "payment is {}, not PENDING",
                payment.status.as_str()
            )));
        }

        tx.execute(
            "UPDATE payments SET status = ?, completed_at = ? WHERE id = ?",
            (
                PaymentStatus::Completed.as_str(),
                at.to_rfc3339(),
                payment_id.to_string(),
            ),
        )?;

        // Stamp the invoice paid once completed payments cover the total.
        let (total, completed): (String, Vec<String>) = {
            let total: String = tx.query_row(
                "SELECT total FROM invoices WHERE id = ?",
                [payment.invoice_id.to_string()],
                |row| row.get(0),
            )?;
            let mut stmt = tx.prepare(
                "SELECT amount FROM payments WHERE invoice_id = ? AND status = 'COMPLETED'",
            )?;
            let amounts = stmt
                .query_map([payment.invoice_id.to_string()], |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            (total, amounts)
        };
        let total = dec_from_sql(&total)?;
        let mut paid_sum = Decimal::ZERO;
        for amount in &completed {
            paid_sum += dec_from_sql(amount)?;
        }
        if paid_sum >= total {
            tx.execute(
                "UPDATE invoices SET paid = 1, payment_date = ?, updated_at = ? WHERE id = ?",
                (
                    at.to_rfc3339(),
                    at.to_rfc3339(),
                    payment.invoice_id.to_string(),
                ),
            )?;
        }

        tx.commit()?;

        Ok(Payment {
            status: PaymentStatus::Completed,
            completed_at: Some(at),
            ..payment
        })
    }

    fn payments_for_invoice(&self, invoice_id: &Uuid) -> Result<Vec<Payment>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM payments WHERE invoice_id = ? ORDER BY created_at",
            PAYMENT_COLUMNS
        ))?;
        let rows = stmt.query_map([invoice_id.to_string()], payment_from_row)?;
        let mut payments = Vec::new();
        for row in rows {
            payments.push(decode_payment(row?)?);
        }
        Ok(payments)
    }
}

impl FaultCatalog for SqliteStore {
    fn fault_by_id(&self, id: &Uuid) -> Result<Option<Fault>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            &format!(
                "SELECT {} FROM faults f JOIN fault_groups g ON g.id = f.group_id WHERE f.id = ?",
                FAULT_COLUMNS
            ),
            [id.to_string()],
            fault_from_row,
        );
        match result {
            Ok(row) => Ok(Some(decode_fault(row)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn current_hourly_rate(&self) -> Result<Decimal> {
        let conn = self.lock_conn()?;
        let value: String = conn.query_row(
            "SELECT hourly_rate FROM settings WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        dec_from_sql(&value)
    }

    fn current_vat_rate(&self) -> Result<Decimal> {
        let conn = self.lock_conn()?;
        let value: String =
            conn.query_row("SELECT vat_rate FROM settings WHERE id = 1", [], |row| {
                row.get(0)
            })?;
        dec_from_sql(&value)
    }
}

/// Quote insert: sequence bump, quote row and lines in one transaction, so
/// an aborted insert cannot burn a number.
fn insert_quote_tx(conn: &mut Connection, quote: &Quote) -> Result<Quote> {
    let tx = conn.transaction()?;

    let year = quote.created_at.year();
    let seq = bump_sequence(&tx, DocumentKind::Quote, year)?;
    let quote_number = format_document_number(DocumentKind::Quote, year, seq);

    let result = tx.execute(
        r#"
        INSERT INTO quotes (id, case_id, quote_number, total_labor, total_parts,
                            total_pre_tax, vat_rate, vat_amount, total, validity_date,
                            validated, accepted, refused, refusal_reason, acceptance_date,
                            created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        rusqlite::params![
            quote.id.to_string(),
            quote.case_id.to_string(),
            &quote_number,
            quote.total_labor.to_string(),
            quote.total_parts.to_string(),
            quote.total_pre_tax.to_string(),
            quote.vat_rate.to_string(),
            quote.vat_amount.to_string(),
            quote.total.to_string(),
            date_to_sql(quote.validity_date),
            quote.validated,
            quote.accepted,
            quote.refused,
            &quote.refusal_reason,
            quote.acceptance_date.map(|dt| dt.to_rfc3339()),
            quote.created_at.to_rfc3339(),
            quote.updated_at.to_rfc3339(),
        ],
    );
    if let Err(e) = result {
        if is_unique_violation(&e, "quotes.case_id") {
            return Err(GarageError::QuoteAlreadyExists);
        }
        return Err(e.into());
    }

    insert_quote_lines(&tx, &quote.id.to_string(), &quote.lines)?;
    tx.commit()?;

    Ok(Quote {
        quote_number,
        ..quote.clone()
    })
}

/// Invoice insert; same transactional discipline as quotes.
fn insert_invoice_tx(conn: &mut Connection, invoice: &Invoice) -> Result<Invoice> {
    let tx = conn.transaction()?;

    let year = invoice.created_at.year();
    let seq = bump_sequence(&tx, DocumentKind::Invoice, year)?;
    let invoice_number = format_document_number(DocumentKind::Invoice, year, seq);

    let result = tx.execute(
        r#"
        INSERT INTO invoices (id, case_id, quote_id, invoice_number, total_pre_tax,
                              vat_rate, vat_amount, total, paid, payment_date,
                              created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?, ?)
        "#,
        (
            invoice.id.to_string(),
            invoice.case_id.to_string(),
            invoice.quote_id.to_string(),
            &invoice_number,
            invoice.total_pre_tax.to_string(),
            invoice.vat_rate.to_string(),
            invoice.vat_amount.to_string(),
            invoice.total.to_string(),
            invoice.created_at.to_rfc3339(),
            invoice.updated_at.to_rfc3339(),
        ),
    );
    if let Err(e) = result {
        if is_unique_violation(&e, "invoices.case_id") {
            return Err(GarageError::InvoiceAlreadyExists);
        }
        return Err(e.into());
    }

    for (position, line) in invoice.lines.iter().enumerate() {
        tx.execute(
            r#"
            INSERT INTO invoice_lines (id, invoice_id, description, quantity,
                                       unit_price, line_total, position)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            (
                line.id.to_string(),
                invoice.id.to_string(),
                &line.description,
                line.quantity,
                line.unit_price.to_string(),
                line.line_total.to_string(),
                position as i64,
            ),
        )?;
    }

    tx.commit()?;

    Ok(Invoice {
        invoice_number,
        ..invoice.clone()
    })
}

fn load_invoice(conn: &Connection, column: &str, value: &str) -> Result<Option<Invoice>> {
    let result = conn.query_row(
        &format!(
            "SELECT id, case_id, quote_id, invoice_number, total_pre_tax, vat_rate, \
             vat_amount, total, paid, payment_date, created_at, updated_at \
             FROM invoices WHERE {} = ?",
            column
        ),
        [value],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, bool>(8)?,
                row.get::<_, Option<String>>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, String>(11)?,
            ))
        },
    );
    match result {
        Ok((
            id,
            case_id,
            quote_id,
            invoice_number,
            total_pre_tax,
            vat_rate,
            vat_amount,
            total,
            paid,
            payment_date,
            created_at,
            updated_at,
        )) => {
            let lines = load_invoice_lines(conn, &id)?;
            Ok(Some(Invoice {
                id: uuid_from_sql(&id)?,
                case_id: uuid_from_sql(&case_id)?,
                quote_id: uuid_from_sql(&quote_id)?,
                invoice_number,
                lines,
                total_pre_tax: dec_from_sql(&total_pre_tax)?,
                vat_rate: dec_from_sql(&vat_rate)?,
                vat_amount: dec_from_sql(&vat_amount)?,
                total: dec_from_sql(&total)?,
                paid,
                payment_date: datetime_opt_from_sql(payment_date)?,
                created_at: datetime_from_sql(&created_at)?,
                updated_at: datetime_from_sql(&updated_at)?,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_codec_round_trip() {
        for weekday in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            assert_eq!(weekday_from_sql(weekday_to_sql(weekday)).unwrap(), weekday);
        }
        assert!(weekday_from_sql(7).is_err());
    }

    #[test]
    fn test_decimal_codec() {
        let value = Decimal::new(27600, 2);
        assert_eq!(dec_from_sql(&value.to_string()).unwrap(), value);
        assert!(dec_from_sql("not a number").is_err());
    }

    #[test]
    fn test_date_time_codec() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        assert_eq!(date_from_sql(&date_to_sql(date)).unwrap(), date);

        let time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        assert_eq!(time_from_sql(&time_to_sql(time)).unwrap(), time);
    }
}
