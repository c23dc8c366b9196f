//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// Identifies a budget.
pub type BudgetId = DatabaseId;
/// Identifies a spending category.
pub type CategoryId = DatabaseId;
/// Identifies a recurring transaction template.
pub type TemplateId = DatabaseId;
/// Identifies one effective-dated version of a template.
pub type VersionId = DatabaseId;
/// Identifies a concrete transaction.
pub type TransactionId = DatabaseId;
