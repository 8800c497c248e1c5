//! Command-line interface definition.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use uuid::Uuid;

use garage_core::VERSION;

/// Garage - repair-case workflow from intake to billing
#[derive(Parser)]
#[command(name = "garage")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the garage database
    #[arg(short, long, global = true, env = "GARAGE_DB", default_value = "garage.db")]
    pub db: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new database with default settings
    Init,

    /// Load the standard fault catalog and weekday slot templates
    Seed,

    /// Show or change the workshop settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// List the fault catalog
    Faults,

    /// Repair cases
    Case {
        #[command(subcommand)]
        command: CaseCommands,
    },

    /// Quotes
    Quote {
        #[command(subcommand)]
        command: QuoteCommands,
    },

    /// Appointment slots
    Slots {
        #[command(subcommand)]
        command: SlotCommands,
    },

    /// Appointments
    Appt {
        #[command(subcommand)]
        command: ApptCommands,
    },

    /// Invoices and payments
    Invoice {
        #[command(subcommand)]
        command: InvoiceCommands,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print the current settings
    Show,

    /// Update one or more settings
    Set(SettingsSetArgs),
}

#[derive(Args)]
pub struct SettingsSetArgs {
    /// Labor rate per hour
    #[arg(long)]
    pub hourly_rate: Option<Decimal>,

    /// VAT rate as a fraction (e.g. 0.20)
    #[arg(long)]
    pub vat_rate: Option<Decimal>,

    /// Quote validity in days
    #[arg(long)]
    pub validity_days: Option<u32>,

    /// Appointment cancel/modify window in hours
    #[arg(long)]
    pub cancel_window_hours: Option<u32>,

    /// Quote variation notification threshold
    #[arg(long)]
    pub variation_threshold: Option<Decimal>,
}

#[derive(Subcommand)]
pub enum CaseCommands {
    /// Open a new repair case
    Create {
        /// Client reference
        #[arg(long)]
        client: Uuid,

        /// Vehicle reference
        #[arg(long)]
        vehicle: Uuid,

        /// Problem description
        #[arg(long)]
        description: String,

        /// Urgency: low, normal or high
        #[arg(long, default_value = "normal")]
        urgency: String,
    },

    /// List cases
    List {
        /// Filter by status (e.g. NEW, QUOTE_ISSUED)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one case
    Show {
        case_id: Uuid,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Select catalog faults on a case (NEW only)
    AddFault {
        case_id: Uuid,

        /// Fault ids to attach
        #[arg(required = true)]
        fault_ids: Vec<Uuid>,
    },

    /// Remove a selected fault (NEW only)
    RemoveFault { case_id: Uuid, fault_id: Uuid },

    /// Force a status transition along the workflow table
    SetStatus {
        case_id: Uuid,

        /// Target status (e.g. IN_PROGRESS)
        status: String,

        #[arg(long, default_value = "garage")]
        actor: String,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Print the status timeline
    History { case_id: Uuid },

    /// Expire every issued quote past its validity date
    ExpireOverdue,
}

#[derive(Subcommand)]
pub enum QuoteCommands {
    /// Generate the quote for a case from its selected faults
    Generate { case_id: Uuid },

    /// Show a case's quote
    Show {
        case_id: Uuid,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Validate and issue the quote to the client
    Validate {
        case_id: Uuid,

        #[arg(long, default_value = "manager")]
        actor: String,
    },

    /// Accept the quote (client)
    Accept {
        case_id: Uuid,

        #[arg(long, default_value = "client")]
        actor: String,
    },

    /// Refuse the quote (client)
    Refuse {
        case_id: Uuid,

        #[arg(long)]
        reason: Option<String>,

        #[arg(long, default_value = "client")]
        actor: String,
    },
}

#[derive(Subcommand)]
pub enum SlotCommands {
    /// List every configured slot
    List,

    /// Slots still bookable on a date
    Available { date: NaiveDate },

    /// Add a recurring or one-off slot
    Add(SlotAddArgs),

    /// Mark a closure day (holiday)
    Close { date: NaiveDate },
}

#[derive(Args)]
pub struct SlotAddArgs {
    /// Weekday for a recurring slot (mon..sun)
    #[arg(long, conflicts_with = "date")]
    pub weekday: Option<String>,

    /// Date for a one-off slot
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Start time (HH:MM)
    #[arg(long)]
    pub start: String,

    /// End time (HH:MM)
    #[arg(long)]
    pub end: String,
}

#[derive(Subcommand)]
pub enum ApptCommands {
    /// Book an available slot for a case
    Book {
        case_id: Uuid,

        #[arg(long)]
        date: NaiveDate,

        /// Slot id from `slots available`
        #[arg(long)]
        slot: Uuid,

        #[arg(long, default_value = "client")]
        actor: String,
    },

    /// Move an appointment to another date/slot
    Modify {
        appointment_id: Uuid,

        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        slot: Uuid,
    },

    /// Cancel an appointment
    Cancel {
        appointment_id: Uuid,

        #[arg(long)]
        reason: Option<String>,

        #[arg(long, default_value = "client")]
        actor: String,
    },
}

#[derive(Subcommand)]
pub enum InvoiceCommands {
    /// Derive the invoice from the case's accepted quote
    Generate { case_id: Uuid },

    /// Show a case's invoice
    Show {
        case_id: Uuid,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Record and complete a payment against the case's invoice
    Pay {
        case_id: Uuid,

        #[arg(long)]
        amount: Decimal,

        /// cash, card, check, transfer or other
        #[arg(long, default_value = "card")]
        method: String,

        /// External transaction reference
        #[arg(long, value_name = "REF")]
        transaction: Option<String>,
    },
}
