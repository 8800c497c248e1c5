//! Garage CLI - drives the repair-case workflow against a SQLite database.

mod cli;
mod commands;
mod helpers;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use garage_core::{GarageConfig, SqliteStore};

use cli::{
    ApptCommands, CaseCommands, Cli, Commands, InvoiceCommands, QuoteCommands, SettingsCommands,
    SlotCommands,
};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let path = Path::new(&cli.db);

    if let Commands::Init = cli.command {
        SqliteStore::create(path, &GarageConfig::default())?;
        println!("created {}", path.display());
        return Ok(());
    }

    let mut store = SqliteStore::open(path)?;

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Seed => commands::catalog::seed(&mut store)?,
        Commands::Settings { command } => match command {
            SettingsCommands::Show => commands::catalog::settings_show(&store)?,
            SettingsCommands::Set(args) => commands::catalog::settings_set(&mut store, args)?,
        },
        Commands::Faults => commands::catalog::faults_list(&store)?,
        Commands::Case { command } => match command {
            CaseCommands::Create {
                client,
                vehicle,
                description,
                urgency,
            } => commands::cases::create(&mut store, client, vehicle, description, &urgency)?,
            CaseCommands::List { status } => {
                commands::cases::list(&store, status.as_deref())?
            }
            CaseCommands::Show { case_id, json } => commands::cases::show(&store, case_id, json)?,
            CaseCommands::AddFault { case_id, fault_ids } => {
                commands::cases::add_faults(&mut store, case_id, &fault_ids)?
            }
            CaseCommands::RemoveFault { case_id, fault_id } => {
                commands::cases::remove_fault(&mut store, case_id, fault_id)?
            }
            CaseCommands::SetStatus {
                case_id,
                status,
                actor,
                comment,
            } => commands::cases::set_status(
                &mut store,
                case_id,
                &status,
                &actor,
                comment.as_deref(),
            )?,
            CaseCommands::History { case_id } => commands::cases::history(&store, case_id)?,
            CaseCommands::ExpireOverdue => commands::cases::expire_overdue(&mut store)?,
        },
        Commands::Quote { command } => match command {
            QuoteCommands::Generate { case_id } => {
                commands::quotes::generate(&mut store, case_id)?
            }
            QuoteCommands::Show { case_id, json } => commands::quotes::show(&store, case_id, json)?,
            QuoteCommands::Validate { case_id, actor } => {
                commands::quotes::validate(&mut store, case_id, &actor)?
            }
            QuoteCommands::Accept { case_id, actor } => {
                commands::quotes::accept(&mut store, case_id, &actor)?
            }
            QuoteCommands::Refuse {
                case_id,
                reason,
                actor,
            } => commands::quotes::refuse(&mut store, case_id, reason.as_deref(), &actor)?,
        },
        Commands::Slots { command } => match command {
            SlotCommands::List => commands::appointments::slots_list(&store)?,
            SlotCommands::Available { date } => {
                commands::appointments::slots_available(&mut store, date)?
            }
            SlotCommands::Add(args) => commands::appointments::slots_add(&mut store, args)?,
            SlotCommands::Close { date } => commands::appointments::slots_close(&mut store, date)?,
        },
        Commands::Appt { command } => match command {
            ApptCommands::Book {
                case_id,
                date,
                slot,
                actor,
            } => commands::appointments::book(&mut store, case_id, date, slot, &actor)?,
            ApptCommands::Modify {
                appointment_id,
                date,
                slot,
            } => commands::appointments::modify(&mut store, appointment_id, date, slot)?,
            ApptCommands::Cancel {
                appointment_id,
                reason,
                actor,
            } => commands::appointments::cancel(
                &mut store,
                appointment_id,
                reason.as_deref(),
                &actor,
            )?,
        },
        Commands::Invoice { command } => match command {
            InvoiceCommands::Generate { case_id } => {
                commands::billing::generate(&mut store, case_id)?
            }
            InvoiceCommands::Show { case_id, json } => {
                commands::billing::show(&store, case_id, json)?
            }
            InvoiceCommands::Pay {
                case_id,
                amount,
                method,
                transaction,
            } => commands::billing::pay(&mut store, case_id, amount, &method, transaction)?,
        },
    }

    Ok(())
}
