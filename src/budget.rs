//! Budgets own categories, recurring templates and transactions.
//!
//! Budget management lives outside this crate, only the table and the
//! lookups the recurring engine depends on are defined here.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::BudgetId};

/// A budget that groups categories, templates and transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// The ID of the budget.
    pub id: BudgetId,
    /// The display name of the budget.
    pub name: String,
}

/// Create a budget in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_budget(name: &str, connection: &Connection) -> Result<Budget, Error> {
    connection
        .prepare("INSERT INTO budget (name) VALUES (?1) RETURNING id, name")?
        .query_row([name], map_budget_row)
        .map_err(|error| error.into())
}

/// Retrieve a budget by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid budget,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_budget(id: BudgetId, connection: &Connection) -> Result<Budget, Error> {
    connection
        .prepare("SELECT id, name FROM budget WHERE id = :id")?
        .query_row(&[(":id", &id)], map_budget_row)
        .map_err(|error| error.into())
}

/// Create the budget table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}
