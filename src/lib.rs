//! Recurring transactions for a shared budgeting service.
//!
//! This library keeps the effective-dated history of recurring transaction
//! templates and turns active templates into concrete transactions for the
//! days of the current month that have already been reached.
//!
//! The main entry point is [RecurringService], which wraps a SQLite
//! connection and an injectable [Clock]. The database functions it is built on
//! are also exported for callers that manage their own connections.

#![warn(missing_docs)]

use time::Date;

mod budget;
mod category;
mod clock;
mod database_id;
mod db;
mod recurring;
mod service;
mod timezone;
mod transaction;

pub use budget::{Budget, create_budget, get_budget};
pub use category::{Category, create_category, get_category};
pub use clock::{Clock, FixedClock, TimezoneClock, UtcClock};
pub use database_id::{BudgetId, CategoryId, DatabaseId, TemplateId, TransactionId, VersionId};
pub use db::initialize as initialize_db;
pub use recurring::{
    Frequency, NewTemplate, RecurringTemplate, RecurringVersion, TemplateChanges,
    TemplateDetails, cancel_pending, create_template, delete_template, due_dates,
    fetch_history, fetch_pending, fetch_with_pending, get_template, list_templates, materialize,
    promote_due_versions, submit_update, toggle_active,
};
pub use service::RecurringService;
pub use transaction::{
    Transaction, TransactionBuilder, TransactionKind, count_transactions, create_transaction,
    get_transaction, get_transactions_for_budget,
};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The recurring transaction template does not exist.
    #[error("the recurring transaction {0} could not be found")]
    TemplateNotFound(TemplateId),

    /// The recurring transaction version does not exist.
    #[error("the recurring transaction version {0} could not be found")]
    VersionNotFound(VersionId),

    /// Tried to cancel a version that has already taken effect.
    ///
    /// Only versions scheduled strictly after today can be cancelled, past and
    /// current versions are part of the permanent history.
    #[error("cannot cancel version {version_id}: it took effect on {effective_from}")]
    CancelNonPendingVersion {
        /// The version the caller tried to cancel.
        version_id: VersionId,
        /// The day the version became effective.
        effective_from: Date,
    },

    /// An immediate change was backdated to before the current version started.
    #[error(
        "cannot apply a change effective {effective_date}: the current version has been \
        effective since {current_from}"
    )]
    BackdatedChange {
        /// The requested effective date.
        effective_date: Date,
        /// The `effective_from` of the version that is currently open.
        current_from: Date,
    },

    /// The caller provided malformed input. Nothing was written.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),
}

impl Error {
    /// Whether the error refers to a template, version or row that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound | Error::TemplateNotFound(_) | Error::VersionNotFound(_)
        )
    }

    /// Whether the operation was rejected because it would break the version history.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Error::CancelNonPendingVersion { .. } | Error::BackdatedChange { .. }
        )
    }

    /// Whether the input was rejected before anything was written.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

/// Input that is rejected before touching the database.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    /// Amounts are stored without a sign, the kind says which way the money goes.
    #[error("the amount must be greater than zero, got {0}")]
    NonPositiveAmount(f64),

    /// The title is empty or only whitespace.
    #[error("the title cannot be empty")]
    EmptyTitle,

    /// The day does not make sense for the frequency.
    #[error("{day} is not a valid day for a {frequency} recurring transaction")]
    DayOutOfRange {
        /// The frequency the day was checked against.
        frequency: Frequency,
        /// The rejected day.
        day: u8,
    },

    /// The frequency string is not one of `monthly`, `weekly` or `yearly`.
    #[error("\"{0}\" is not a valid frequency")]
    UnknownFrequency(String),

    /// The transaction kind string is not one of `expense` or `income`.
    #[error("\"{0}\" is not a valid transaction type")]
    UnknownKind(String),
}
