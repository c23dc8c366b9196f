//! Recurring transactions.
//!
//! A [RecurringTemplate] describes a transaction that repeats weekly, monthly
//! or yearly. Changes to a template are recorded as effective-dated
//! [RecurringVersion]s so the history of past values is kept and changes can
//! be scheduled ahead of time. [materialize] turns due occurrences into
//! ordinary transactions, once per occurrence.

mod materialize;
mod models;
mod schedule;
mod template;
mod version;

pub use materialize::materialize;
pub use models::{
    Frequency, NewTemplate, RecurringTemplate, RecurringVersion, TemplateChanges, TemplateDetails,
};
pub use schedule::due_dates;
pub use template::{
    create_template, create_template_table, delete_template, fetch_with_pending, get_template,
    list_templates, toggle_active,
};
pub use version::{
    cancel_pending, create_version_table, fetch_history, fetch_pending, promote_due_versions,
    submit_update,
};
