//! Spending categories, used by templates and transactions.
//!
//! Category management is handled elsewhere. The recurring engine only needs
//! to look categories up to name them when listing templates.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::{BudgetId, CategoryId},
};

/// A spending category, optionally nested under a parent category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The budget the category belongs to.
    pub budget_id: BudgetId,
    /// The display name, e.g. "Groceries".
    pub name: String,
    /// The category this one is nested under, if any.
    pub parent_id: Option<CategoryId>,
}

/// Create a category in the database.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `budget_id` or `parent_id` do not refer to existing rows,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    budget_id: BudgetId,
    name: &str,
    parent_id: Option<CategoryId>,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "INSERT INTO category (budget_id, name, parent_id) VALUES (?1, ?2, ?3)
             RETURNING id, budget_id, name, parent_id",
        )?
        .query_row((budget_id, name, parent_id), map_category_row)
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })
}

/// Retrieve a category by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_category(id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, budget_id, name, parent_id FROM category WHERE id = :id")?
        .query_row(&[(":id", &id)], map_category_row)
        .map_err(|error| error.into())
}

/// Create the category table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                budget_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                parent_id INTEGER,
                FOREIGN KEY(budget_id) REFERENCES budget(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(parent_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        budget_id: row.get(1)?,
        name: row.get(2)?,
        parent_id: row.get(3)?,
    })
}
