//! The registry of recurring transaction templates.

use rusqlite::{Connection, Row};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::{BudgetId, CategoryId, TemplateId},
};

use super::{
    models::{NewTemplate, RecurringTemplate, TemplateDetails, TemplateFields},
    version::fetch_pending,
};

const TEMPLATE_COLUMNS: &str =
    "id, budget_id, category_id, title, amount, transaction_type, frequency, day, active, created_at";

/// Create a recurring transaction template. New templates are active.
///
/// No version is recorded on creation: the history starts with the first
/// update.
///
/// # Errors
/// This function will return a:
/// - [Error::Validation] if the template is invalid,
/// - [Error::NotFound] if the budget or category does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_template(
    new_template: NewTemplate,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<RecurringTemplate, Error> {
    new_template.validate()?;

    let template = connection
        .prepare(&format!(
            "INSERT INTO recurring_template
                (budget_id, category_id, title, amount, transaction_type, frequency, day, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)
             RETURNING {TEMPLATE_COLUMNS}"
        ))?
        .query_row(
            (
                new_template.budget_id,
                new_template.category_id,
                new_template.title,
                new_template.amount,
                new_template.kind,
                new_template.frequency,
                new_template.day,
                now,
            ),
            map_template_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })?;

    tracing::info!(
        "Created {} recurring transaction {} \"{}\" in budget {}",
        template.frequency,
        template.id,
        template.title,
        template.budget_id
    );

    Ok(template)
}

/// Retrieve a template by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::TemplateNotFound] if `id` does not refer to a valid template,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_template(id: TemplateId, connection: &Connection) -> Result<RecurringTemplate, Error> {
    connection
        .prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM recurring_template WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_template_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TemplateNotFound(id),
            error => error.into(),
        })
}

/// Flip a template between active and inactive.
///
/// # Errors
/// This function will return a:
/// - [Error::TemplateNotFound] if `id` does not refer to a valid template,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn toggle_active(id: TemplateId, connection: &Connection) -> Result<RecurringTemplate, Error> {
    let template = connection
        .prepare(&format!(
            "UPDATE recurring_template SET active = NOT active WHERE id = :id
             RETURNING {TEMPLATE_COLUMNS}"
        ))?
        .query_row(&[(":id", &id)], map_template_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TemplateNotFound(id),
            error => error.into(),
        })?;

    tracing::info!(
        "Recurring transaction {} is now {}",
        template.id,
        if template.active { "active" } else { "inactive" }
    );

    Ok(template)
}

/// Delete a template and its version history.
///
/// Transactions that were already generated from the template are kept.
///
/// # Errors
/// This function will return a:
/// - [Error::TemplateNotFound] if `id` does not refer to a valid template,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_template(id: TemplateId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM recurring_template WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::TemplateNotFound(id));
    }

    tracing::info!("Deleted recurring transaction {id}");

    Ok(())
}

/// Retrieve a template with its category names and next scheduled change.
///
/// # Errors
/// This function will return a:
/// - [Error::TemplateNotFound] if `id` does not refer to a valid template,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn fetch_with_pending(
    id: TemplateId,
    today: Date,
    connection: &Connection,
) -> Result<TemplateDetails, Error> {
    let (template, category_name, parent_category_id, parent_category_name) = connection
        .prepare(&format!("{DETAILS_QUERY} WHERE r.id = :id"))?
        .query_row(&[(":id", &id)], map_details_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TemplateNotFound(id),
            error => error.into(),
        })?;

    Ok(TemplateDetails {
        pending_version: fetch_pending(template.id, today, connection)?,
        template,
        category_name,
        parent_category_id,
        parent_category_name,
    })
}

/// Retrieve every template in a budget with category names and next scheduled change.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_templates(
    budget_id: BudgetId,
    today: Date,
    connection: &Connection,
) -> Result<Vec<TemplateDetails>, Error> {
    let rows = connection
        .prepare(&format!(
            "{DETAILS_QUERY} WHERE r.budget_id = :budget_id ORDER BY r.id ASC"
        ))?
        .query_map(&[(":budget_id", &budget_id)], map_details_row)?
        .collect::<Result<Vec<_>, rusqlite::Error>>()?;

    rows.into_iter()
        .map(
            |(template, category_name, parent_category_id, parent_category_name)| -> Result<TemplateDetails, Error> {
                Ok(TemplateDetails {
                    pending_version: fetch_pending(template.id, today, connection)?,
                    template,
                    category_name,
                    parent_category_id,
                    parent_category_name,
                })
            },
        )
        .collect()
}

/// The IDs of every template in a budget, active or not.
pub(crate) fn get_template_ids(
    budget_id: BudgetId,
    connection: &Connection,
) -> Result<Vec<TemplateId>, Error> {
    connection
        .prepare("SELECT id FROM recurring_template WHERE budget_id = :budget_id ORDER BY id")?
        .query_map(&[(":budget_id", &budget_id)], |row| row.get(0))?
        .map(|maybe_id| maybe_id.map_err(|error| error.into()))
        .collect()
}

/// The active templates in a budget.
pub(crate) fn get_active_templates(
    budget_id: BudgetId,
    connection: &Connection,
) -> Result<Vec<RecurringTemplate>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM recurring_template
             WHERE budget_id = :budget_id AND active = 1
             ORDER BY id"
        ))?
        .query_map(&[(":budget_id", &budget_id)], map_template_row)?
        .map(|maybe_template| maybe_template.map_err(|error| error.into()))
        .collect()
}

/// Overwrite the versioned fields of a template.
pub(crate) fn set_template_fields(
    id: TemplateId,
    fields: &TemplateFields,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE recurring_template
         SET title = ?1, amount = ?2, category_id = ?3, frequency = ?4, day = ?5
         WHERE id = ?6",
        (
            &fields.title,
            fields.amount,
            fields.category_id,
            fields.frequency,
            fields.day,
            id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::TemplateNotFound(id));
    }

    Ok(())
}

/// Create the recurring template table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_template_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_template (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                budget_id INTEGER NOT NULL,
                category_id INTEGER,
                title TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount > 0),
                transaction_type TEXT NOT NULL CHECK (transaction_type IN ('expense', 'income')),
                frequency TEXT NOT NULL CHECK (frequency IN ('weekly', 'monthly', 'yearly')),
                day INTEGER,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                FOREIGN KEY(budget_id) REFERENCES budget(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    connection.execute(
        "INSERT INTO sqlite_sequence (name, seq)
         SELECT 'recurring_template', 0
         WHERE NOT EXISTS (SELECT 1 FROM sqlite_sequence WHERE name = 'recurring_template')",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_recurring_template_budget ON recurring_template(budget_id)",
        (),
    )?;

    Ok(())
}

const DETAILS_QUERY: &str = "SELECT r.id, r.budget_id, r.category_id, r.title, r.amount,
        r.transaction_type, r.frequency, r.day, r.active, r.created_at,
        c.name, c.parent_id, pc.name
    FROM recurring_template r
    LEFT JOIN category c ON r.category_id = c.id
    LEFT JOIN category pc ON c.parent_id = pc.id";

type DetailsRow = (RecurringTemplate, String, Option<CategoryId>, Option<String>);

fn map_details_row(row: &Row) -> Result<DetailsRow, rusqlite::Error> {
    let template = map_template_row(row)?;
    let category_name: Option<String> = row.get(10)?;

    Ok((
        template,
        category_name.unwrap_or_else(|| "Unknown".to_owned()),
        row.get(11)?,
        row.get(12)?,
    ))
}

fn map_template_row(row: &Row) -> Result<RecurringTemplate, rusqlite::Error> {
    Ok(RecurringTemplate {
        id: row.get(0)?,
        budget_id: row.get(1)?,
        category_id: row.get(2)?,
        title: row.get(3)?,
        amount: row.get(4)?,
        kind: row.get(5)?,
        frequency: row.get(6)?,
        day: row.get(7)?,
        active: row.get(8)?,
        created_at: row.get(9)?,
    })
}
