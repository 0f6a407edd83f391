use super::TransactionKind;

/// Default expense categories offered when recording transactions.
pub const EXPENSE_CATEGORIES: &[&str] = &[
    "Food & Dining",
    "Transportation",
    "Shopping",
    "Entertainment",
    "Bills & Utilities",
    "Healthcare",
    "Education",
    "Travel",
    "Other",
];

/// Default income categories offered when recording transactions.
pub const INCOME_CATEGORIES: &[&str] = &["Salary", "Freelance", "Investment", "Gift", "Other"];

pub fn suggested_categories(kind: TransactionKind) -> &'static [&'static str] {
    match kind {
        TransactionKind::Income => INCOME_CATEGORIES,
        TransactionKind::Expense => EXPENSE_CATEGORIES,
    }
}
