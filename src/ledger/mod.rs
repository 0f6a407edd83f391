//! Ledger domain models, the recurrence engine, and the caller-side store.

pub mod budget;
pub mod category;
pub mod frequency;
#[allow(clippy::module_inception)]
pub mod ledger;
pub mod recurring;
pub mod rule;
pub mod transaction;

pub use budget::{Budget, BudgetUsage};
pub use category::{suggested_categories, EXPENSE_CATEGORIES, INCOME_CATEGORIES};
pub use frequency::Frequency;
pub use ledger::{Ledger, ReconcileReport, Totals};
pub use recurring::{
    generate_due_transactions, occurrence_exists, GenerationOutcome, OccurrenceIndex,
    RecurrenceEngine,
};
pub use rule::RecurrenceRule;
pub use transaction::{occurrence_id, Transaction, TransactionKind, AUTO_SUFFIX};
