use std::{
    error::Error,
    sync::{Arc, Mutex},
};

use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use time::{Date, macros::format_description};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use recurring_budget::{
    BudgetId, CategoryId, Clock, FixedClock, Frequency, NewTemplate, RecurringService,
    TemplateChanges, TemplateId, TimezoneClock, TransactionKind, VersionId,
};

/// Manage recurring transactions in a budget database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The canonical timezone used to work out today's date, e.g. "Pacific/Auckland".
    #[arg(long, default_value = "Etc/UTC")]
    timezone: String,

    /// Act as if today were this date (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    today: Option<Date>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a recurring transaction.
    Create {
        #[arg(long)]
        budget_id: BudgetId,
        #[arg(long)]
        title: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        category_id: Option<CategoryId>,
        /// "expense" or "income".
        #[arg(long, default_value = "expense")]
        kind: TransactionKind,
        /// "weekly", "monthly" or "yearly".
        #[arg(long)]
        frequency: Frequency,
        /// Day of the week (0 = Monday) or day of the month.
        #[arg(long)]
        day: Option<u8>,
    },
    /// List the recurring transactions in a budget.
    List {
        #[arg(long)]
        budget_id: BudgetId,
    },
    /// Show a recurring transaction and its next scheduled change.
    Show { template_id: TemplateId },
    /// Pause or resume a recurring transaction.
    Toggle { template_id: TemplateId },
    /// Change a recurring transaction now or from a given date.
    Update {
        template_id: TemplateId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        category_id: Option<CategoryId>,
        #[arg(long)]
        frequency: Option<Frequency>,
        #[arg(long)]
        day: Option<u8>,
        /// The first day the change applies (YYYY-MM-DD). Defaults to today.
        #[arg(long, value_parser = parse_date)]
        effective_date: Option<Date>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Show every version of a recurring transaction, latest first.
    History { template_id: TemplateId },
    /// Cancel a change that has not taken effect yet.
    Cancel { version_id: VersionId },
    /// Delete a recurring transaction and its history.
    Delete { template_id: TemplateId },
    /// Apply changes to a recurring transaction whose day has arrived.
    Promote { template_id: TemplateId },
    /// Create the transactions due so far this month.
    Materialize {
        #[arg(long)]
        budget_id: BudgetId,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    setup_logging();

    let args = Args::parse();

    let clock: Arc<dyn Clock> = match args.today {
        Some(today) => Arc::new(FixedClock::on(today)),
        None => Arc::new(TimezoneClock::new(&args.timezone)?),
    };

    let conn = Connection::open(&args.db_path)?;
    let service = RecurringService::new(Arc::new(Mutex::new(conn)), clock)?;

    match args.command {
        Command::Create {
            budget_id,
            title,
            amount,
            category_id,
            kind,
            frequency,
            day,
        } => print_json(&service.create_template(NewTemplate {
            budget_id,
            title,
            amount,
            category_id,
            kind,
            frequency,
            day,
        })?),
        Command::List { budget_id } => print_json(&service.list_templates(budget_id)?),
        Command::Show { template_id } => print_json(&service.fetch_with_pending(template_id)?),
        Command::Toggle { template_id } => print_json(&service.toggle_active(template_id)?),
        Command::Update {
            template_id,
            title,
            amount,
            category_id,
            frequency,
            day,
            effective_date,
            reason,
        } => {
            let changes = TemplateChanges {
                title,
                amount,
                category_id,
                frequency,
                day,
            };

            print_json(&service.submit_update(
                template_id,
                &changes,
                effective_date,
                reason.as_deref(),
            )?)
        }
        Command::History { template_id } => print_json(&service.fetch_history(template_id)?),
        Command::Cancel { version_id } => {
            service.cancel_pending(version_id)?;
            print_json(&version_id)
        }
        Command::Delete { template_id } => {
            service.delete_template(template_id)?;
            print_json(&template_id)
        }
        Command::Promote { template_id } => {
            print_json(&service.promote_due_versions(template_id)?)
        }
        Command::Materialize { budget_id } => print_json(&service.materialize(budget_id)?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);

    Ok(())
}

fn parse_date(text: &str) -> Result<Date, time::error::Parse> {
    Date::parse(text, format_description!("[year]-[month]-[day]"))
}

fn setup_logging() {
    let stderr_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(stderr_log)
        .init();
}
