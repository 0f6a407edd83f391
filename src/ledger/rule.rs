use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    frequency::Frequency,
    transaction::{occurrence_id, Transaction, TransactionKind, AUTO_SUFFIX},
};

/// A recurrence definition: what to book, how often, and within which window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurrenceRule {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_generated: Option<NaiveDate>,
    #[serde(default = "RecurrenceRule::default_active")]
    pub is_active: bool,
}

impl RecurrenceRule {
    pub fn new(
        kind: TransactionKind,
        amount: f64,
        category: impl Into<String>,
        description: impl Into<String>,
        frequency: Frequency,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            amount,
            category: category.into(),
            description: description.into(),
            frequency,
            start_date,
            end_date: None,
            last_generated: None,
            is_active: true,
        }
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Date the next catch-up pass steps from.
    pub fn cursor(&self) -> NaiveDate {
        self.last_generated.unwrap_or(self.start_date)
    }

    /// True once `today` is past the end date.
    pub fn has_lapsed(&self, today: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| today > end)
    }

    /// True when the rule has lapsed and no occurrence remains between its
    /// cursor and its end date.
    pub fn is_exhausted(&self, today: NaiveDate) -> bool {
        let Some(end) = self.end_date else {
            return false;
        };
        self.has_lapsed(today)
            && self
                .frequency
                .next_date(self.cursor())
                .map_or(true, |next| next > end)
    }

    /// Builds the concrete transaction for the occurrence on `date`.
    pub fn materialize(&self, date: NaiveDate) -> Transaction {
        Transaction {
            id: occurrence_id(self.id, date),
            kind: self.kind,
            amount: self.amount,
            category: self.category.clone(),
            description: format!("{}{}", self.description, AUTO_SUFFIX),
            date,
            recurring_id: Some(self.id),
        }
    }

    pub fn default_active() -> bool {
        true
    }
}
