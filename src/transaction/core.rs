//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error, ValidationError,
    database_id::{BudgetId, CategoryId, DatabaseId, TransactionId},
};

// ============================================================================
// MODELS
// ============================================================================

/// Which way the money moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money spent.
    Expense,
    /// Money earned.
    Income,
}

impl TransactionKind {
    /// The lowercase name used in the database and in serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Expense => "expense",
            TransactionKind::Income => "income",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" => Ok(TransactionKind::Expense),
            "income" => Ok(TransactionKind::Income),
            _ => Err(ValidationError::UnknownKind(s.to_owned())),
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// A concrete ledger entry: money spent or earned on a specific day.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The budget the transaction is recorded in.
    pub budget_id: BudgetId,
    /// The category the transaction belongs to.
    pub category_id: Option<CategoryId>,
    /// A short description of what the transaction was for.
    pub title: String,
    /// The amount of money spent or earned, always positive.
    pub amount: f64,
    /// Whether the money was spent or earned.
    pub kind: TransactionKind,
    /// When the transaction happened.
    pub date: Date,
    /// A free-form note.
    pub comment: Option<String>,
    /// Whether the transaction was generated from a recurring template.
    pub is_recurring: bool,
    /// The budget member who paid, if recorded.
    pub paid_by_user_id: Option<DatabaseId>,
    /// When the row was created.
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        budget_id: BudgetId,
        title: &str,
        amount: f64,
        kind: TransactionKind,
        date: Date,
    ) -> TransactionBuilder {
        TransactionBuilder {
            budget_id,
            category_id: None,
            title: title.to_owned(),
            amount,
            kind,
            date,
            comment: None,
            is_recurring: false,
            paid_by_user_id: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// Optional fields default to `None`/`false`. Pass the builder to
/// [create_transaction] to insert it.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The budget the transaction is recorded in.
    pub budget_id: BudgetId,
    /// The category of the transaction, e.g. "Groceries", "Rent".
    pub category_id: Option<CategoryId>,
    /// A short description of what the transaction was for.
    pub title: String,
    /// The amount of money spent or earned, always positive.
    pub amount: f64,
    /// Whether the money was spent or earned.
    pub kind: TransactionKind,
    /// When the transaction happened.
    pub date: Date,
    /// A free-form note.
    pub comment: Option<String>,
    /// Whether the transaction was generated from a recurring template.
    ///
    /// Generated transactions take part in de-duplication, see
    /// [find_recurring_duplicate].
    pub is_recurring: bool,
    /// The budget member who paid, if recorded.
    pub paid_by_user_id: Option<DatabaseId>,
}

impl TransactionBuilder {
    /// Set the category for the transaction.
    pub fn category_id(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Set the comment for the transaction.
    pub fn comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    /// Mark the transaction as generated from a recurring template.
    pub fn recurring(mut self, is_recurring: bool) -> Self {
        self.is_recurring = is_recurring;
        self
    }

    /// Set who paid for the transaction.
    pub fn paid_by_user_id(mut self, paid_by_user_id: Option<DatabaseId>) -> Self {
        self.paid_by_user_id = paid_by_user_id;
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const TRANSACTION_COLUMNS: &str = "id, budget_id, category_id, title, amount, transaction_type, \
    date, comment, is_recurring, paid_by_user_id, created_at";

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::Validation] if the amount is not positive or the title is empty,
/// - [Error::NotFound] if the budget or category does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if !(builder.amount.is_finite() && builder.amount > 0.0) {
        return Err(ValidationError::NonPositiveAmount(builder.amount).into());
    }

    if builder.title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle.into());
    }

    let query = format!(
        "INSERT INTO \"transaction\" (budget_id, category_id, title, amount, transaction_type, \
            date, comment, is_recurring, paid_by_user_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         RETURNING {TRANSACTION_COLUMNS}"
    );

    connection
        .prepare(&query)?
        .query_row(
            (
                builder.budget_id,
                builder.category_id,
                builder.title,
                builder.amount,
                builder.kind,
                builder.date,
                builder.comment,
                builder.is_recurring,
                builder.paid_by_user_id,
                created_at,
            ),
            map_transaction_row,
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

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)
        .map_err(|error| error.into())
}

/// Retrieve every transaction in a budget, newest first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn get_transactions_for_budget(
    budget_id: BudgetId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE budget_id = :budget_id
             ORDER BY date DESC, id ASC"
        ))?
        .query_map(&[(":budget_id", &budget_id)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Find a generated transaction that already covers an occurrence.
///
/// Generated transactions do not reference their template, so an occurrence
/// is identified by the tuple (budget, category, title, amount, date) among
/// rows with `is_recurring` set. A missing category matches a missing
/// category.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn find_recurring_duplicate(
    budget_id: BudgetId,
    category_id: Option<CategoryId>,
    title: &str,
    amount: f64,
    date: Date,
    connection: &Connection,
) -> Result<Option<TransactionId>, Error> {
    let mut statement = connection.prepare_cached(
        "SELECT id FROM \"transaction\"
         WHERE budget_id = ?1
         AND category_id IS ?2
         AND title = ?3
         AND amount = ?4
         AND date = ?5
         AND is_recurring = 1
         LIMIT 1",
    )?;

    let mut rows = statement.query((budget_id, category_id, title, amount, date))?;

    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                budget_id INTEGER NOT NULL,
                category_id INTEGER,
                title TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount > 0),
                transaction_type TEXT NOT NULL CHECK (transaction_type IN ('expense', 'income')),
                date TEXT NOT NULL,
                comment TEXT,
                is_recurring INTEGER NOT NULL DEFAULT 0,
                paid_by_user_id INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY(budget_id) REFERENCES budget(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT INTO sqlite_sequence (name, seq)
         SELECT 'transaction', 0
         WHERE NOT EXISTS (SELECT 1 FROM sqlite_sequence WHERE name = 'transaction')",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_budget_date ON \"transaction\"(budget_id, date);",
        (),
    )?;

    // At most one generated transaction per occurrence, even if two writers race.
    connection.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_transaction_recurring_occurrence
         ON \"transaction\"(budget_id, IFNULL(category_id, 0), title, amount, date)
         WHERE is_recurring = 1;",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub(crate) fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        budget_id: row.get(1)?,
        category_id: row.get(2)?,
        title: row.get(3)?,
        amount: row.get(4)?,
        kind: row.get(5)?,
        date: row.get(6)?,
        comment: row.get(7)?,
        is_recurring: row.get(8)?,
        paid_by_user_id: row.get(9)?,
        created_at: row.get(10)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::macros::{date, datetime};

    use crate::{
        Error, ValidationError,
        budget::create_budget,
        category::create_category,
        db::initialize,
        transaction::{
            Transaction, TransactionKind, count_transactions, create_transaction,
            find_recurring_duplicate, get_transaction, get_transactions_for_budget,
        },
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_budget("Test", &conn).unwrap();
        conn
    }

    #[test]
    fn create_succeeds() {
        let conn = get_test_connection();
        let amount = 12.3;

        let result = create_transaction(
            Transaction::build(1, "Coffee", amount, TransactionKind::Expense, date!(2025 - 10 - 05)),
            datetime!(2025-10-05 09:00 UTC),
            &conn,
        );

        match result {
            Ok(transaction) => {
                assert_eq!(transaction.amount, amount);
                assert_eq!(transaction.kind, TransactionKind::Expense);
                assert!(!transaction.is_recurring);
                assert_eq!(get_transaction(transaction.id, &conn), Ok(transaction));
            }
            Err(error) => panic!("Unexpected error: {error}"),
        }
    }

    #[test]
    fn create_fails_on_negative_amount() {
        let conn = get_test_connection();

        let result = create_transaction(
            Transaction::build(1, "Refund", -5.0, TransactionKind::Income, date!(2025 - 10 - 05)),
            datetime!(2025-10-05 09:00 UTC),
            &conn,
        );

        assert_eq!(
            result,
            Err(Error::Validation(ValidationError::NonPositiveAmount(-5.0)))
        );
    }

    #[test]
    fn create_fails_on_missing_category() {
        let conn = get_test_connection();

        let result = create_transaction(
            Transaction::build(1, "Rent", 500.0, TransactionKind::Expense, date!(2025 - 10 - 01))
                .category_id(Some(42)),
            datetime!(2025-10-05 09:00 UTC),
            &conn,
        );

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_missing_transaction_fails() {
        let conn = get_test_connection();

        assert_eq!(get_transaction(7, &conn), Err(Error::NotFound));
    }

    #[test]
    fn get_count() {
        let conn = get_test_connection();
        let today = date!(2025 - 10 - 05);
        let want_count = 20;
        for i in 1..=want_count {
            create_transaction(
                Transaction::build(1, "Snack", i as f64, TransactionKind::Expense, today),
                datetime!(2025-10-05 09:00 UTC),
                &conn,
            )
            .expect("Could not create transaction");
        }

        let got_count = count_transactions(&conn).expect("Could not get count");

        assert_eq!(want_count, got_count);
        assert_eq!(get_transactions_for_budget(1, &conn).unwrap().len(), 20);
    }

    #[test]
    fn duplicate_lookup_matches_exact_tuple() {
        let conn = get_test_connection();
        let category = create_category(1, "Housing", None, &conn).unwrap();
        let date = date!(2025 - 10 - 01);
        let created = create_transaction(
            Transaction::build(1, "Rent", 500.0, TransactionKind::Expense, date)
                .category_id(Some(category.id))
                .recurring(true),
            datetime!(2025-10-05 09:00 UTC),
            &conn,
        )
        .unwrap();

        let found = find_recurring_duplicate(1, Some(category.id), "Rent", 500.0, date, &conn);
        let other_amount = find_recurring_duplicate(1, Some(category.id), "Rent", 501.0, date, &conn);
        let other_category = find_recurring_duplicate(1, None, "Rent", 500.0, date, &conn);

        assert_eq!(found, Ok(Some(created.id)));
        assert_eq!(other_amount, Ok(None));
        assert_eq!(other_category, Ok(None));
    }

    #[test]
    fn duplicate_lookup_matches_missing_category() {
        let conn = get_test_connection();
        let date = date!(2025 - 10 - 01);
        let created = create_transaction(
            Transaction::build(1, "Gym", 30.0, TransactionKind::Expense, date).recurring(true),
            datetime!(2025-10-05 09:00 UTC),
            &conn,
        )
        .unwrap();

        let found = find_recurring_duplicate(1, None, "Gym", 30.0, date, &conn);

        assert_eq!(found, Ok(Some(created.id)));
    }

    #[test]
    fn duplicate_lookup_ignores_manual_transactions() {
        let conn = get_test_connection();
        let date = date!(2025 - 10 - 01);
        create_transaction(
            Transaction::build(1, "Gym", 30.0, TransactionKind::Expense, date),
            datetime!(2025-10-05 09:00 UTC),
            &conn,
        )
        .unwrap();

        let found = find_recurring_duplicate(1, None, "Gym", 30.0, date, &conn);

        assert_eq!(found, Ok(None));
    }

    #[test]
    fn database_rejects_second_generated_copy() {
        let conn = get_test_connection();
        let builder =
            Transaction::build(1, "Gym", 30.0, TransactionKind::Expense, date!(2025 - 10 - 01))
                .recurring(true);
        create_transaction(builder.clone(), datetime!(2025-10-05 09:00 UTC), &conn).unwrap();

        let result = create_transaction(builder, datetime!(2025-10-05 09:00 UTC), &conn);

        assert!(matches!(result, Err(Error::SqlError(_))));
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Income".parse::<TransactionKind>(), Ok(TransactionKind::Income));
        assert_eq!(
            "refund".parse::<TransactionKind>(),
            Err(ValidationError::UnknownKind("refund".to_owned()))
        );
    }
}
