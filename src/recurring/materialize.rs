//! Turns due occurrences of recurring templates into transactions.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    budget::get_budget,
    database_id::BudgetId,
    transaction::{Transaction, create_transaction, find_recurring_duplicate},
};

use super::{
    models::RecurringTemplate,
    schedule::due_dates,
    template::{get_active_templates, get_template_ids},
    version::{promote, versions_in_effect},
};

/// Create the transactions for every occurrence of the budget's active
/// templates that is due this month up to and including today.
///
/// Versions whose day has arrived are promoted first. Each occurrence uses
/// the values of the version in effect on its day, and days before a
/// template's first version are not generated. Occurrences that already have
/// a generated transaction with the same budget, category, title, amount and
/// date are skipped, so calling this any number of times on the same day
/// creates each transaction once.
///
/// Everything happens in one SQL transaction. If any insert fails, nothing
/// is created.
///
/// Returns the transactions created by this call.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `budget_id` does not refer to a valid budget,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn materialize(
    budget_id: BudgetId,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let today = now.date();
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    get_budget(budget_id, &transaction)?;

    for template_id in get_template_ids(budget_id, &transaction)? {
        promote(template_id, today, &transaction)?;
    }

    let mut created = Vec::new();

    for template in get_active_templates(budget_id, &transaction)? {
        for (values, date) in occurrences(&template, today, &transaction)? {
            let duplicate = find_recurring_duplicate(
                budget_id,
                values.category_id,
                &values.title,
                values.amount,
                date,
                &transaction,
            )?;

            if let Some(existing_id) = duplicate {
                tracing::debug!(
                    "Skipping {} on {date} for recurring transaction {}, already created as transaction {existing_id}",
                    values.title,
                    template.id
                );
                continue;
            }

            let new_transaction = create_transaction(
                Transaction::build(budget_id, &values.title, values.amount, values.kind, date)
                    .category_id(values.category_id)
                    .comment(Some(format!(
                        "Auto-generated from recurring: {}",
                        values.title
                    )))
                    .recurring(true),
                now,
                &transaction,
            )?;

            created.push(new_transaction);
        }
    }

    transaction.commit()?;

    if !created.is_empty() {
        tracing::info!(
            "Created {} recurring transactions for budget {budget_id}",
            created.len()
        );
    }

    Ok(created)
}

/// The occurrences of `template` due so far this month, each paired with the
/// values of the version in effect on its day.
///
/// Once a template has versions, days before its first version are skipped.
/// The values in effect on those days were overwritten by that version.
fn occurrences(
    template: &RecurringTemplate,
    today: Date,
    connection: &Connection,
) -> Result<Vec<(RecurringTemplate, Date)>, Error> {
    let month_start = today.replace_day(1).unwrap_or(today);
    let versions = versions_in_effect(template.id, month_start, today, connection)?;

    if versions.is_empty() {
        return Ok(due_dates(template, today.year(), today.month(), today)
            .into_iter()
            .map(|date| (template.clone(), date))
            .collect());
    }

    let mut occurrences = Vec::new();

    for version in versions {
        let values = template.with_fields(version.fields());

        occurrences.extend(
            due_dates(&values, today.year(), today.month(), today)
                .into_iter()
                .filter(|date| {
                    version.effective_from <= *date
                        && version.effective_until.is_none_or(|until| *date < until)
                })
                .map(|date| (values.clone(), date)),
        );
    }

    Ok(occurrences)
}
