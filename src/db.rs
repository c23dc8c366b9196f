/*! Sets up the database schema. */

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error,
    budget::create_budget_table,
    category::create_category_table,
    recurring::{create_template_table, create_version_table},
    transaction::create_transaction_table,
};

/// Create the tables and indexes if they do not exist and turn on foreign keys.
///
/// Safe to call on a database that has already been initialized.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Has no effect inside a transaction.
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_budget_table(&transaction)?;
    create_category_table(&transaction)?;
    create_template_table(&transaction)?;
    create_version_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
