//! Concrete ledger entries.
//!
//! Plain transaction management lives outside this crate. This module holds
//! the `Transaction` model and the queries the recurring engine needs: insert,
//! lookup, and the duplicate check used when materializing occurrences.

mod core;

pub use core::{
    Transaction, TransactionBuilder, TransactionKind, count_transactions, create_transaction,
    create_transaction_table, find_recurring_duplicate, get_transaction,
    get_transactions_for_budget,
};
