//! The recurring transaction service shared by every caller of a database.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use time::Date;

use crate::{
    Error,
    budget::{Budget, create_budget},
    category::{Category, create_category},
    clock::Clock,
    database_id::{BudgetId, CategoryId, TemplateId, VersionId},
    db::initialize,
    recurring::{
        self, NewTemplate, RecurringTemplate, RecurringVersion, TemplateChanges, TemplateDetails,
    },
    transaction::{Transaction, get_transactions_for_budget},
};

/// Creates, versions and materializes recurring transactions.
///
/// Reads "today" from the injected [Clock] so callers never pass dates
/// except for scheduling changes. Clones share the same connection.
#[derive(Clone)]
pub struct RecurringService {
    db_connection: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl RecurringService {
    /// Create a service for `connection`, creating the tables if needed.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the database could not be initialized,
    /// or an [Error::DatabaseLockError] if the connection lock is poisoned.
    pub fn new(db_connection: Arc<Mutex<Connection>>, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        {
            let connection = db_connection
                .lock()
                .map_err(|_| Error::DatabaseLockError)?;
            initialize(&connection)?;
        }

        Ok(Self {
            db_connection,
            clock,
        })
    }

    /// The day the service currently considers today.
    pub fn today(&self) -> Date {
        self.clock.today()
    }

    /// Create a budget to hold templates and transactions.
    ///
    /// # Errors
    /// See [create_budget].
    pub fn create_budget(&self, name: &str) -> Result<Budget, Error> {
        create_budget(name, &*self.connection()?)
    }

    /// Create a category in a budget.
    ///
    /// # Errors
    /// See [create_category].
    pub fn create_category(
        &self,
        budget_id: BudgetId,
        name: &str,
        parent_id: Option<CategoryId>,
    ) -> Result<Category, Error> {
        create_category(budget_id, name, parent_id, &*self.connection()?)
    }

    /// Create a recurring transaction template.
    ///
    /// # Errors
    /// See [crate::create_template].
    pub fn create_template(&self, template: NewTemplate) -> Result<RecurringTemplate, Error> {
        recurring::create_template(template, self.clock.now(), &*self.connection()?)
    }

    /// Pause or resume a template.
    ///
    /// # Errors
    /// See [crate::toggle_active].
    pub fn toggle_active(&self, template_id: TemplateId) -> Result<RecurringTemplate, Error> {
        recurring::toggle_active(template_id, &*self.connection()?)
    }

    /// Change a template today, on an earlier day, or from a future day.
    ///
    /// # Errors
    /// See [crate::submit_update].
    pub fn submit_update(
        &self,
        template_id: TemplateId,
        changes: &TemplateChanges,
        effective_date: Option<Date>,
        reason: Option<&str>,
    ) -> Result<TemplateDetails, Error> {
        recurring::submit_update(
            template_id,
            changes,
            effective_date,
            reason,
            self.clock.now(),
            &*self.connection()?,
        )
    }

    /// A template with its category names and its next scheduled change.
    ///
    /// # Errors
    /// See [crate::fetch_with_pending].
    pub fn fetch_with_pending(&self, template_id: TemplateId) -> Result<TemplateDetails, Error> {
        recurring::fetch_with_pending(template_id, self.clock.today(), &*self.connection()?)
    }

    /// Every template in a budget with its details.
    ///
    /// # Errors
    /// See [crate::list_templates].
    pub fn list_templates(&self, budget_id: BudgetId) -> Result<Vec<TemplateDetails>, Error> {
        recurring::list_templates(budget_id, self.clock.today(), &*self.connection()?)
    }

    /// Every version of a template, latest first.
    ///
    /// # Errors
    /// See [crate::fetch_history].
    pub fn fetch_history(&self, template_id: TemplateId) -> Result<Vec<RecurringVersion>, Error> {
        recurring::fetch_history(template_id, &*self.connection()?)
    }

    /// Delete a version that has not taken effect yet.
    ///
    /// # Errors
    /// See [crate::cancel_pending].
    pub fn cancel_pending(&self, version_id: VersionId) -> Result<(), Error> {
        recurring::cancel_pending(version_id, self.clock.today(), &*self.connection()?)
    }

    /// Delete a template and its history. Generated transactions are kept.
    ///
    /// # Errors
    /// See [crate::delete_template].
    pub fn delete_template(&self, template_id: TemplateId) -> Result<(), Error> {
        recurring::delete_template(template_id, &*self.connection()?)
    }

    /// Apply versions of a template whose day has arrived.
    ///
    /// # Errors
    /// See [crate::promote_due_versions].
    pub fn promote_due_versions(
        &self,
        template_id: TemplateId,
    ) -> Result<Option<RecurringVersion>, Error> {
        recurring::promote_due_versions(template_id, self.clock.today(), &*self.connection()?)
    }

    /// Create the transactions that are due for a budget so far this month.
    ///
    /// # Errors
    /// See [crate::materialize].
    pub fn materialize(&self, budget_id: BudgetId) -> Result<Vec<Transaction>, Error> {
        recurring::materialize(budget_id, self.clock.now(), &*self.connection()?)
    }

    /// Every transaction in a budget, newest first.
    ///
    /// # Errors
    /// See [get_transactions_for_budget].
    pub fn transactions_for_budget(&self, budget_id: BudgetId) -> Result<Vec<Transaction>, Error> {
        get_transactions_for_budget(budget_id, &*self.connection()?)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)
    }
}
