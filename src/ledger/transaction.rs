use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::TrackerError;

/// Marker appended to the description of every engine-generated transaction.
pub const AUTO_SUFFIX: &str = " (Auto)";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn label(self) -> &'static str {
        match self {
            TransactionKind::Income => "Income",
            TransactionKind::Expense => "Expense",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TransactionKind {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" | "in" => Ok(TransactionKind::Income),
            "expense" | "out" => Ok(TransactionKind::Expense),
            other => Err(TrackerError::Validation(format!(
                "unknown transaction kind `{}` (expected income or expense)",
                other
            ))),
        }
    }
}

/// A concrete, dated ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_id: Option<Uuid>,
}

impl Transaction {
    pub fn new(
        kind: TransactionKind,
        amount: f64,
        category: impl Into<String>,
        description: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            amount,
            category: category.into(),
            description: description.into(),
            date,
            recurring_id: None,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.recurring_id.is_some()
    }

    /// Amount with the sign of its kind: income positive, expense negative.
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }
}

/// Deterministic id for the occurrence of `rule_id` on `date`.
///
/// The id is a v5 UUID in the rule's namespace, named by the occurrence's
/// midnight-UTC epoch milliseconds.
pub fn occurrence_id(rule_id: Uuid, date: NaiveDate) -> Uuid {
    let epoch_millis = date.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    Uuid::new_v5(&rule_id, epoch_millis.to_string().as_bytes())
}
