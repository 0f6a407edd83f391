use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{
    budget::{Budget, BudgetUsage},
    recurring::generate_due_transactions,
    RecurrenceRule, Transaction, TransactionKind,
};
use crate::errors::{Result, TrackerError};

const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Caller-owned store holding transactions and the rules that generate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub rules: Vec<RecurrenceRule>,
    #[serde(default)]
    pub budgets: Vec<Budget>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "Ledger::schema_version_default")]
    pub schema_version: u8,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub reference: Option<NaiveDate>,
    pub generated: Vec<(Uuid, usize)>,
}

impl ReconcileReport {
    pub fn total(&self) -> usize {
        self.generated.iter().map(|(_, count)| count).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub income: f64,
    pub expense: f64,
    pub net: f64,
}

impl Ledger {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            transactions: Vec::new(),
            rules: Vec::new(),
            budgets: Vec::new(),
            created_at: now,
            updated_at: now,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<Uuid> {
        validate_entry(transaction.amount, &transaction.category, &transaction.description)?;
        let id = transaction.id;
        self.transactions.push(transaction);
        self.touch();
        Ok(id)
    }

    pub fn remove_transaction(&mut self, id: Uuid) -> Result<Transaction> {
        let position = self
            .transactions
            .iter()
            .position(|txn| txn.id == id)
            .ok_or(TrackerError::TransactionNotFound(id))?;
        let removed = self.transactions.remove(position);
        self.touch();
        Ok(removed)
    }

    pub fn add_rule(&mut self, rule: RecurrenceRule) -> Result<Uuid> {
        validate_entry(rule.amount, &rule.category, &rule.description)?;
        let id = rule.id;
        self.rules.push(rule);
        self.touch();
        Ok(id)
    }

    /// Removes a rule together with every transaction it generated.
    pub fn remove_rule(&mut self, id: Uuid) -> Result<(RecurrenceRule, usize)> {
        let position = self
            .rules
            .iter()
            .position(|rule| rule.id == id)
            .ok_or(TrackerError::RuleNotFound(id))?;
        let rule = self.rules.remove(position);
        let before = self.transactions.len();
        self.transactions
            .retain(|txn| txn.recurring_id != Some(id));
        let removed = before - self.transactions.len();
        self.touch();
        Ok((rule, removed))
    }

    /// Flips the rule between active and paused, returning the new state.
    pub fn toggle_rule(&mut self, id: Uuid) -> Result<bool> {
        let rule = self
            .rules
            .iter_mut()
            .find(|rule| rule.id == id)
            .ok_or(TrackerError::RuleNotFound(id))?;
        rule.is_active = !rule.is_active;
        let active = rule.is_active;
        self.touch();
        Ok(active)
    }

    /// Materializes every occurrence due on or before `today` and merges the result.
    pub fn reconcile(&mut self, today: NaiveDate) -> ReconcileReport {
        let outcome = generate_due_transactions(&self.rules, &self.transactions, today);
        let mut report = ReconcileReport {
            reference: Some(today),
            generated: Vec::new(),
        };
        if outcome.is_empty() {
            return report;
        }
        for rule in &outcome.rules {
            if report.generated.iter().any(|(id, _)| *id == rule.id) {
                continue;
            }
            let count = outcome.generated_for(rule.id);
            if count > 0 {
                report.generated.push((rule.id, count));
            }
        }
        self.transactions.extend(outcome.transactions);
        self.rules = outcome.rules;
        self.touch();
        info!(
            ledger = %self.name,
            generated = report.total(),
            %today,
            "reconciled recurring transactions"
        );
        report
    }

    pub fn totals(&self) -> Totals {
        self.totals_for(None, None)
    }

    /// Income, expense and net over the transactions matching `month` and `category`.
    pub fn totals_for(&self, month: Option<(i32, u32)>, category: Option<&str>) -> Totals {
        let mut totals = Totals::default();
        for txn in self.filtered(month, category) {
            match txn.kind {
                TransactionKind::Income => totals.income += txn.amount,
                TransactionKind::Expense => totals.expense += txn.amount,
            }
        }
        totals.net = totals.income - totals.expense;
        totals
    }

    /// Transactions in the calendar `month` (year, month) and exact `category`,
    /// newest first. `None` leaves that dimension unfiltered.
    pub fn filtered(&self, month: Option<(i32, u32)>, category: Option<&str>) -> Vec<&Transaction> {
        self.transactions_by_date()
            .into_iter()
            .filter(|txn| month.map_or(true, |month| in_month(txn.date, month)))
            .filter(|txn| category.map_or(true, |category| txn.category == category))
            .collect()
    }

    /// Sets the limit for `category`, replacing any existing budget for it.
    /// Returns `true` when an existing budget was replaced.
    pub fn set_budget(&mut self, category: &str, limit: f64) -> Result<bool> {
        let category = category.trim();
        if category.is_empty() {
            return Err(TrackerError::Validation("category is required".into()));
        }
        if !limit.is_finite() || limit <= 0.0 {
            return Err(TrackerError::Validation(format!(
                "budget limit must be a positive number, got {}",
                limit
            )));
        }
        let replaced = match self.budgets.iter_mut().find(|b| b.category == category) {
            Some(existing) => {
                existing.limit = limit;
                true
            }
            None => {
                self.budgets.push(Budget::new(category, limit));
                false
            }
        };
        self.touch();
        Ok(replaced)
    }

    pub fn remove_budget(&mut self, category: &str) -> Result<Budget> {
        let position = self
            .budgets
            .iter()
            .position(|budget| budget.category == category.trim())
            .ok_or_else(|| TrackerError::BudgetNotFound(category.trim().to_string()))?;
        let removed = self.budgets.remove(position);
        self.touch();
        Ok(removed)
    }

    /// Expense spending per category in the given calendar month, sorted by
    /// category. Every budgeted category is listed, spent or not.
    pub fn month_spending(&self, year: i32, month: u32) -> Vec<BudgetUsage> {
        let mut spent: BTreeMap<&str, f64> = self
            .budgets
            .iter()
            .map(|budget| (budget.category.as_str(), 0.0))
            .collect();
        for txn in &self.transactions {
            if txn.kind == TransactionKind::Expense && in_month(txn.date, (year, month)) {
                *spent.entry(txn.category.as_str()).or_insert(0.0) += txn.amount;
            }
        }
        spent
            .into_iter()
            .map(|(category, spent)| BudgetUsage {
                category: category.to_string(),
                spent,
                limit: self
                    .budgets
                    .iter()
                    .find(|budget| budget.category == category)
                    .map(|budget| budget.limit),
            })
            .collect()
    }

    pub fn transaction(&self, id: Uuid) -> Option<&Transaction> {
        self.transactions.iter().find(|txn| txn.id == id)
    }

    pub fn rule(&self, id: Uuid) -> Option<&RecurrenceRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    pub fn transactions_for_rule(&self, id: Uuid) -> impl Iterator<Item = &Transaction> + '_ {
        self.transactions
            .iter()
            .filter(move |txn| txn.recurring_id == Some(id))
    }

    /// Transactions sorted newest first.
    pub fn transactions_by_date(&self) -> Vec<&Transaction> {
        let mut sorted: Vec<_> = self.transactions.iter().collect();
        sorted.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        sorted
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }
}

fn in_month(date: NaiveDate, (year, month): (i32, u32)) -> bool {
    date.year() == year && date.month() == month
}

fn validate_entry(amount: f64, category: &str, description: &str) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(TrackerError::Validation(format!(
            "amount must be a positive number, got {}",
            amount
        )));
    }
    if category.trim().is_empty() {
        return Err(TrackerError::Validation("category is required".into()));
    }
    if description.trim().is_empty() {
        return Err(TrackerError::Validation("description is required".into()));
    }
    Ok(())
}
