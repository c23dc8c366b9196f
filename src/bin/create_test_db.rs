use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::OffsetDateTime;

use recurring_budget::{
    Frequency, NewTemplate, TransactionKind, create_budget, create_category, create_template,
    initialize_db,
};

/// A utility for creating a test database for the recurring transaction tools.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test budget...");

    let budget = create_budget("Household", &conn)?;
    let housing = create_category(budget.id, "Housing", None, &conn)?;
    let utilities = create_category(budget.id, "Utilities", Some(housing.id), &conn)?;
    let income = create_category(budget.id, "Income", None, &conn)?;

    println!("Creating recurring transactions...");

    let now = OffsetDateTime::now_utc();
    let templates = [
        ("Rent", 450.0, Some(housing.id), TransactionKind::Expense, Frequency::Weekly, Some(0)),
        ("Power", 180.0, Some(utilities.id), TransactionKind::Expense, Frequency::Monthly, Some(20)),
        ("Salary", 5200.0, Some(income.id), TransactionKind::Income, Frequency::Monthly, Some(15)),
        ("Car registration", 95.0, None, TransactionKind::Expense, Frequency::Yearly, Some(1)),
    ];

    for (title, amount, category_id, kind, frequency, day) in templates {
        create_template(
            NewTemplate {
                budget_id: budget.id,
                title: title.to_owned(),
                amount,
                category_id,
                kind,
                frequency,
                day,
            },
            now,
            &conn,
        )?;
    }

    println!("Success!");

    Ok(())
}
