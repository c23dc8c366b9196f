//! Core recurring transaction domain types.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    ValidationError,
    database_id::{BudgetId, CategoryId, TemplateId, VersionId},
    transaction::TransactionKind,
};

/// How often a recurring transaction happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Once a week on a day of the week, 0 = Monday to 6 = Sunday.
    Weekly,
    /// Once a calendar month on a day of the month.
    Monthly,
    /// Once a year on a day of the month the template was created in.
    Yearly,
}

impl Frequency {
    /// The lowercase name used in the database and in serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Check that `day` means something for this frequency.
    ///
    /// Monthly and yearly days are days of the month (1-31). Weekly days are
    /// days of the week (0-6, Monday first). A missing day is always allowed
    /// and falls back to the first day of the period.
    ///
    /// # Errors
    /// Returns a [ValidationError::DayOutOfRange] if `day` is out of range.
    pub fn validate_day(&self, day: Option<u8>) -> Result<(), ValidationError> {
        let valid = match (self, day) {
            (_, None) => true,
            (Frequency::Weekly, Some(day)) => day <= 6,
            (Frequency::Monthly | Frequency::Yearly, Some(day)) => (1..=31).contains(&day),
        };

        match (valid, day) {
            (false, Some(day)) => Err(ValidationError::DayOutOfRange {
                frequency: *self,
                day,
            }),
            _ => Ok(()),
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            _ => Err(ValidationError::UnknownFrequency(s.to_owned())),
        }
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// The fields of a template that are tracked by versions.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TemplateFields {
    pub title: String,
    pub amount: f64,
    pub category_id: Option<CategoryId>,
    pub frequency: Frequency,
    pub day: Option<u8>,
}

impl TemplateFields {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        validate_title_and_amount(&self.title, self.amount)?;
        self.frequency.validate_day(self.day)
    }
}

fn validate_title_and_amount(title: &str, amount: f64) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }

    if !(amount.is_finite() && amount > 0.0) {
        return Err(ValidationError::NonPositiveAmount(amount));
    }

    Ok(())
}

/// The canonical, currently effective state of a recurring transaction.
///
/// Title, amount, category, frequency and day only change when a version
/// takes effect. See [crate::submit_update].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    /// The ID of the template.
    pub id: TemplateId,
    /// The budget the generated transactions are recorded in.
    pub budget_id: BudgetId,
    /// The category given to generated transactions.
    pub category_id: Option<CategoryId>,
    /// The title given to generated transactions.
    pub title: String,
    /// The amount of each occurrence, always positive.
    pub amount: f64,
    /// Whether occurrences are expenses or income.
    pub kind: TransactionKind,
    /// How often the transaction happens.
    pub frequency: Frequency,
    /// The day of the week or month, depending on `frequency`.
    pub day: Option<u8>,
    /// Inactive templates are skipped when materializing.
    pub active: bool,
    /// When the template was created. Yearly templates recur in this month.
    pub created_at: OffsetDateTime,
}

impl RecurringTemplate {
    pub(crate) fn fields(&self) -> TemplateFields {
        TemplateFields {
            title: self.title.clone(),
            amount: self.amount,
            category_id: self.category_id,
            frequency: self.frequency,
            day: self.day,
        }
    }

    /// The template as it was while `fields` were in effect.
    pub(crate) fn with_fields(&self, fields: TemplateFields) -> RecurringTemplate {
        RecurringTemplate {
            title: fields.title,
            amount: fields.amount,
            category_id: fields.category_id,
            frequency: fields.frequency,
            day: fields.day,
            ..self.clone()
        }
    }
}

/// The data needed to create a [RecurringTemplate].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTemplate {
    /// The budget the template belongs to.
    pub budget_id: BudgetId,
    /// The title given to generated transactions.
    pub title: String,
    /// The amount of each occurrence, must be greater than zero.
    pub amount: f64,
    /// The category given to generated transactions.
    pub category_id: Option<CategoryId>,
    /// Whether occurrences are expenses or income.
    pub kind: TransactionKind,
    /// How often the transaction happens.
    pub frequency: Frequency,
    /// The day of the week or month, depending on `frequency`.
    pub day: Option<u8>,
}

impl NewTemplate {
    /// Check the template before it is inserted.
    ///
    /// # Errors
    /// Returns a [ValidationError] if the title is empty, the amount is not
    /// positive, or the day does not fit the frequency.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title_and_amount(&self.title, self.amount)?;
        self.frequency.validate_day(self.day)
    }
}

/// A sparse set of changes to a template. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateChanges {
    /// The new title.
    pub title: Option<String>,
    /// The new amount.
    pub amount: Option<f64>,
    /// The new category. `None` keeps the current category, so a change
    /// cannot remove the category from a template.
    pub category_id: Option<CategoryId>,
    /// The new frequency.
    pub frequency: Option<Frequency>,
    /// The new day.
    pub day: Option<u8>,
}

impl TemplateChanges {
    pub(crate) fn apply_to(&self, current: TemplateFields) -> TemplateFields {
        TemplateFields {
            title: self.title.clone().unwrap_or(current.title),
            amount: self.amount.unwrap_or(current.amount),
            category_id: self.category_id.or(current.category_id),
            frequency: self.frequency.unwrap_or(current.frequency),
            day: self.day.or(current.day),
        }
    }
}

/// An effective-dated snapshot of a template's fields.
///
/// A version is valid from `effective_from` (inclusive) until
/// `effective_until` (exclusive). An open-ended version starting after today
/// is pending and may still be cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringVersion {
    /// The ID of the version.
    pub id: VersionId,
    /// The template the version belongs to.
    pub template_id: TemplateId,
    /// The title from `effective_from` onwards.
    pub title: String,
    /// The amount from `effective_from` onwards.
    pub amount: f64,
    /// The category from `effective_from` onwards.
    pub category_id: Option<CategoryId>,
    /// The frequency from `effective_from` onwards.
    pub frequency: Frequency,
    /// The day from `effective_from` onwards.
    pub day: Option<u8>,
    /// The first day the version applies.
    pub effective_from: Date,
    /// The day the next version took over, `None` if open-ended.
    pub effective_until: Option<Date>,
    /// When the version was recorded.
    pub created_at: OffsetDateTime,
    /// Why the change was made, if the user said.
    pub change_reason: Option<String>,
}

impl RecurringVersion {
    pub(crate) fn fields(&self) -> TemplateFields {
        TemplateFields {
            title: self.title.clone(),
            amount: self.amount,
            category_id: self.category_id,
            frequency: self.frequency,
            day: self.day,
        }
    }
}

/// A template with its category names and the next scheduled change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDetails {
    /// The current state of the template.
    #[serde(flatten)]
    pub template: RecurringTemplate,
    /// The category name, or "Unknown" if the template has no category.
    pub category_name: String,
    /// The parent of the template's category.
    pub parent_category_id: Option<CategoryId>,
    /// The name of the parent category.
    pub parent_category_name: Option<String>,
    /// The earliest version scheduled after today, if any.
    pub pending_version: Option<RecurringVersion>,
}
