//! The effective-dated version history of recurring transaction templates.
//!
//! Every update to a template is recorded as a version. Changes effective
//! today or earlier close the open version and are copied onto the template
//! straight away. Changes effective after today are stored as pending
//! versions and are promoted onto the template once their day arrives, see
//! [promote_due_versions].

use rusqlite::{Connection, Row, Transaction as SqlTransaction, TransactionBehavior};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::{TemplateId, VersionId},
};

use super::{
    models::{RecurringVersion, TemplateChanges, TemplateDetails, TemplateFields},
    template::{fetch_with_pending, get_template, set_template_fields},
};

const VERSION_COLUMNS: &str = "id, template_id, title, amount, category_id, frequency, day, \
    effective_from, effective_until, created_at, change_reason";

/// Record a change to a template.
///
/// Fields missing from `changes` keep the template's current value.
/// `effective_date` defaults to today.
///
/// If `effective_date` is today or earlier the change applies now: the open
/// version is closed on `effective_date`, a new open version starting on
/// `effective_date` is recorded, and the template is updated. Otherwise the
/// change is recorded as a pending version and the template is left alone.
///
/// Returns the template as it is after the call with its next pending version.
/// The whole update happens in one SQL transaction, readers never see a
/// template with zero or two open versions.
///
/// # Errors
/// This function will return a:
/// - [Error::TemplateNotFound] if `template_id` does not refer to a valid template,
/// - [Error::Validation] if the resulting template would be invalid,
/// - [Error::BackdatedChange] if `effective_date` is before the start of the open version,
/// - [Error::NotFound] if the new category does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn submit_update(
    template_id: TemplateId,
    changes: &TemplateChanges,
    effective_date: Option<Date>,
    reason: Option<&str>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<TemplateDetails, Error> {
    let today = now.date();
    let effective_date = effective_date.unwrap_or(today);

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let template = get_template(template_id, &transaction)?;
    promote(template_id, today, &transaction)?;
    let current = get_template(template.id, &transaction)?;

    let fields = changes.apply_to(current.fields());
    fields.validate()?;

    if effective_date <= today {
        if let Some(open_version) = get_open_version(template_id, today, &transaction)? {
            if effective_date < open_version.effective_from {
                return Err(Error::BackdatedChange {
                    effective_date,
                    current_from: open_version.effective_from,
                });
            }

            close_version(open_version.id, effective_date, &transaction)?;
        }

        let version =
            insert_version(template_id, &fields, effective_date, reason, now, &transaction)?;
        set_template_fields(template_id, &fields, &transaction)?;

        tracing::info!(
            "Applied version {} to recurring transaction {template_id} effective {effective_date}",
            version.id
        );
    } else {
        let version =
            insert_version(template_id, &fields, effective_date, reason, now, &transaction)?;

        tracing::info!(
            "Scheduled version {} for recurring transaction {template_id} effective {effective_date}",
            version.id
        );
    }

    transaction.commit()?;

    fetch_with_pending(template_id, today, connection)
}

/// The earliest open-ended version of a template that starts after `today`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn fetch_pending(
    template_id: TemplateId,
    today: Date,
    connection: &Connection,
) -> Result<Option<RecurringVersion>, Error> {
    let mut statement = connection.prepare_cached(&format!(
        "SELECT {VERSION_COLUMNS} FROM recurring_version
         WHERE template_id = ?1
         AND effective_from > ?2
         AND effective_until IS NULL
         ORDER BY effective_from ASC, id ASC
         LIMIT 1"
    ))?;

    let mut rows = statement.query((template_id, today))?;

    match rows.next()? {
        Some(row) => Ok(Some(map_version_row(row)?)),
        None => Ok(None),
    }
}

/// Every version of a template, latest `effective_from` first.
///
/// # Errors
/// This function will return a:
/// - [Error::TemplateNotFound] if `template_id` does not refer to a valid template,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn fetch_history(
    template_id: TemplateId,
    connection: &Connection,
) -> Result<Vec<RecurringVersion>, Error> {
    get_template(template_id, connection)?;

    connection
        .prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM recurring_version
             WHERE template_id = :template_id
             ORDER BY effective_from DESC, id DESC"
        ))?
        .query_map(&[(":template_id", &template_id)], map_version_row)?
        .map(|maybe_version| maybe_version.map_err(|error| error.into()))
        .collect()
}

/// Delete a version that has not taken effect yet.
///
/// # Errors
/// This function will return a:
/// - [Error::VersionNotFound] if `version_id` does not refer to a valid version,
/// - [Error::CancelNonPendingVersion] if the version starts today or earlier,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn cancel_pending(
    version_id: VersionId,
    today: Date,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let version = get_version(version_id, &transaction)?;

    if version.effective_from <= today {
        return Err(Error::CancelNonPendingVersion {
            version_id,
            effective_from: version.effective_from,
        });
    }

    transaction.execute("DELETE FROM recurring_version WHERE id = ?1", [version_id])?;
    transaction.commit()?;

    tracing::info!(
        "Cancelled version {version_id} of recurring transaction {} due {}",
        version.template_id,
        version.effective_from
    );

    Ok(())
}

/// Bring a template up to date with versions whose day has arrived.
///
/// Open versions starting today or earlier are closed in order, each one
/// ending the day its successor starts, and the latest of them is copied onto
/// the template. Calling this again on the same day changes nothing.
///
/// Returns the version that was newly applied to the template, if any.
///
/// # Errors
/// This function will return a:
/// - [Error::TemplateNotFound] if `template_id` does not refer to a valid template,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn promote_due_versions(
    template_id: TemplateId,
    today: Date,
    connection: &Connection,
) -> Result<Option<RecurringVersion>, Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    get_template(template_id, &transaction)?;
    let promoted = promote(template_id, today, &transaction)?;

    transaction.commit()?;

    Ok(promoted)
}

/// Promote arrived versions without opening a transaction of its own.
pub(crate) fn promote(
    template_id: TemplateId,
    today: Date,
    connection: &Connection,
) -> Result<Option<RecurringVersion>, Error> {
    let arrived: Vec<RecurringVersion> = connection
        .prepare_cached(&format!(
            "SELECT {VERSION_COLUMNS} FROM recurring_version
             WHERE template_id = ?1
             AND effective_from <= ?2
             AND effective_until IS NULL
             ORDER BY effective_from ASC, id ASC"
        ))?
        .query_map((template_id, today), map_version_row)?
        .collect::<Result<_, rusqlite::Error>>()?;

    let Some(latest) = arrived.last() else {
        return Ok(None);
    };

    for pair in arrived.windows(2) {
        if let [earlier, later] = pair {
            close_version(earlier.id, later.effective_from, connection)?;
        }
    }

    let template = get_template(template_id, connection)?;
    let fields = latest.fields();

    if template.fields() == fields {
        return Ok(None);
    }

    set_template_fields(template_id, &fields, connection)?;

    tracing::info!(
        "Promoted version {} of recurring transaction {template_id}, effective since {}",
        latest.id,
        latest.effective_from
    );

    Ok(Some(latest.clone()))
}

/// Versions that were in effect at some point between `since` and `today`,
/// earliest first.
pub(crate) fn versions_in_effect(
    template_id: TemplateId,
    since: Date,
    today: Date,
    connection: &Connection,
) -> Result<Vec<RecurringVersion>, Error> {
    connection
        .prepare_cached(&format!(
            "SELECT {VERSION_COLUMNS} FROM recurring_version
             WHERE template_id = ?1
             AND effective_from <= ?2
             AND (effective_until IS NULL OR effective_until > ?3)
             ORDER BY effective_from ASC, id ASC"
        ))?
        .query_map((template_id, today, since), map_version_row)?
        .map(|maybe_version| maybe_version.map_err(|error| error.into()))
        .collect()
}

fn get_version(version_id: VersionId, connection: &Connection) -> Result<RecurringVersion, Error> {
    connection
        .prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM recurring_version WHERE id = :id"
        ))?
        .query_row(&[(":id", &version_id)], map_version_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::VersionNotFound(version_id),
            error => error.into(),
        })
}

/// The open version in effect today, if the template has ever been updated.
fn get_open_version(
    template_id: TemplateId,
    today: Date,
    connection: &Connection,
) -> Result<Option<RecurringVersion>, Error> {
    let mut statement = connection.prepare_cached(&format!(
        "SELECT {VERSION_COLUMNS} FROM recurring_version
         WHERE template_id = ?1
         AND effective_from <= ?2
         AND effective_until IS NULL
         ORDER BY effective_from DESC, id DESC
         LIMIT 1"
    ))?;

    let mut rows = statement.query((template_id, today))?;

    match rows.next()? {
        Some(row) => Ok(Some(map_version_row(row)?)),
        None => Ok(None),
    }
}

fn close_version(
    version_id: VersionId,
    effective_until: Date,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE recurring_version SET effective_until = ?1 WHERE id = ?2",
        (effective_until, version_id),
    )?;

    Ok(())
}

fn insert_version(
    template_id: TemplateId,
    fields: &TemplateFields,
    effective_from: Date,
    reason: Option<&str>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<RecurringVersion, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO recurring_version
                (template_id, title, amount, category_id, frequency, day,
                 effective_from, effective_until, created_at, change_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9)
             RETURNING {VERSION_COLUMNS}"
        ))?
        .query_row(
            (
                template_id,
                &fields.title,
                fields.amount,
                fields.category_id,
                fields.frequency,
                fields.day,
                effective_from,
                now,
                reason,
            ),
            map_version_row,
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
        })
}

/// Create the recurring version table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_version_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_version (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                template_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount > 0),
                category_id INTEGER,
                frequency TEXT NOT NULL CHECK (frequency IN ('weekly', 'monthly', 'yearly')),
                day INTEGER,
                effective_from TEXT NOT NULL,
                effective_until TEXT,
                created_at TEXT NOT NULL,
                change_reason TEXT,
                FOREIGN KEY(template_id) REFERENCES recurring_template(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    connection.execute(
        "INSERT INTO sqlite_sequence (name, seq)
         SELECT 'recurring_version', 0
         WHERE NOT EXISTS (SELECT 1 FROM sqlite_sequence WHERE name = 'recurring_version')",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_recurring_version_template
         ON recurring_version(template_id, effective_from)",
        (),
    )?;

    Ok(())
}

fn map_version_row(row: &Row) -> Result<RecurringVersion, rusqlite::Error> {
    Ok(RecurringVersion {
        id: row.get(0)?,
        template_id: row.get(1)?,
        title: row.get(2)?,
        amount: row.get(3)?,
        category_id: row.get(4)?,
        frequency: row.get(5)?,
        day: row.get(6)?,
        effective_from: row.get(7)?,
        effective_until: row.get(8)?,
        created_at: row.get(9)?,
        change_reason: row.get(10)?,
    })
}
