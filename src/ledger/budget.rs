use serde::{Deserialize, Serialize};

/// A monthly spending limit for one expense category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub category: String,
    pub limit: f64,
}

impl Budget {
    pub fn new(category: impl Into<String>, limit: f64) -> Self {
        Self {
            category: category.into(),
            limit,
        }
    }
}

/// Expense spending for one category within a calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetUsage {
    pub category: String,
    pub spent: f64,
    /// `None` when the category has spending but no budget.
    pub limit: Option<f64>,
}

impl BudgetUsage {
    pub fn remaining(&self) -> Option<f64> {
        self.limit.map(|limit| limit - self.spent)
    }

    pub fn is_over(&self) -> bool {
        self.limit.is_some_and(|limit| self.spent > limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_without_limit_is_never_over() {
        let usage = BudgetUsage {
            category: "Travel".into(),
            spent: 900.0,
            limit: None,
        };
        assert!(!usage.is_over());
        assert_eq!(usage.remaining(), None);

        let capped = BudgetUsage {
            limit: Some(500.0),
            ..usage
        };
        assert!(capped.is_over());
        assert_eq!(capped.remaining(), Some(-400.0));
    }
}
