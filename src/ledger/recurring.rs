//! Catch-up generation of concrete transactions from recurrence rules.
//!
//! [`generate_due_transactions`] is a pure batch function: it reads a snapshot of
//! rules and already-materialized transactions and returns the missing
//! occurrences up to a reference day together with the rules' updated
//! bookkeeping. Callers merge both results atomically.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::{RecurrenceRule, Transaction};
use crate::time::Clock;

/// Result of one generation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOutcome {
    /// Newly materialized transactions, grouped by rule in rule order and dated ascending.
    pub transactions: Vec<Transaction>,
    /// Every input rule, in input order, with `last_generated` advanced where applicable.
    pub rules: Vec<RecurrenceRule>,
}

impl GenerationOutcome {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn generated_for(&self, rule_id: Uuid) -> usize {
        self.transactions
            .iter()
            .filter(|txn| txn.recurring_id == Some(rule_id))
            .count()
    }
}

/// Set of `(rule, day)` pairs that already have a transaction.
#[derive(Debug, Default)]
pub struct OccurrenceIndex {
    seen: HashSet<(Uuid, NaiveDate)>,
}

impl OccurrenceIndex {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let seen = transactions
            .iter()
            .filter_map(|txn| txn.recurring_id.map(|rule_id| (rule_id, txn.date)))
            .collect();
        Self { seen }
    }

    pub fn contains(&self, rule_id: Uuid, date: NaiveDate) -> bool {
        self.seen.contains(&(rule_id, date))
    }

    /// Records the pair, returning `false` if it was already present.
    pub fn insert(&mut self, rule_id: Uuid, date: NaiveDate) -> bool {
        self.seen.insert((rule_id, date))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Returns whether `transactions` already holds an occurrence of `rule_id` on `date`.
pub fn occurrence_exists(transactions: &[Transaction], rule_id: Uuid, date: NaiveDate) -> bool {
    transactions
        .iter()
        .any(|txn| txn.recurring_id == Some(rule_id) && txn.date == date)
}

/// Generates every occurrence due on or before `today` that is not yet materialized.
///
/// Rules are processed independently. Inactive rules, and ended rules whose
/// occurrences are all behind their cursor, pass through unchanged. For the
/// others the cursor starts at `last_generated` (or `start_date`) and advances
/// one period at a time until it passes `today` or the rule's end date, so a
/// rule that ended since the last pass still gets its remaining in-window
/// occurrences. Occurrences already present in `existing` are not
/// emitted again but still advance the cursor. `last_generated` is moved to the
/// last in-window date reached only when the pass emitted at least one
/// transaction for the rule. Active copies of a repeated rule id all end up
/// with the latest `last_generated` any copy reached.
pub fn generate_due_transactions(
    rules: &[RecurrenceRule],
    existing: &[Transaction],
    today: NaiveDate,
) -> GenerationOutcome {
    let mut index = OccurrenceIndex::from_transactions(existing);
    let mut transactions = Vec::new();
    let mut updated = Vec::with_capacity(rules.len());
    let mut advanced: HashMap<Uuid, NaiveDate> = HashMap::new();

    for rule in rules {
        let mut next = rule.clone();
        if let Some(last) = catch_up(rule, today, &mut index, &mut transactions) {
            next.last_generated = Some(last);
            advanced
                .entry(rule.id)
                .and_modify(|reached| *reached = (*reached).max(last))
                .or_insert(last);
        }
        updated.push(next);
    }

    for rule in updated.iter_mut().filter(|rule| rule.is_active) {
        if let Some(&reached) = advanced.get(&rule.id) {
            if rule.last_generated.map_or(true, |last| last < reached) {
                rule.last_generated = Some(reached);
            }
        }
    }

    GenerationOutcome {
        transactions,
        rules: updated,
    }
}

fn catch_up(
    rule: &RecurrenceRule,
    today: NaiveDate,
    index: &mut OccurrenceIndex,
    out: &mut Vec<Transaction>,
) -> Option<NaiveDate> {
    if !rule.is_active {
        trace!(rule = %rule.id, "rule paused; skipping");
        return None;
    }
    if rule.is_exhausted(today) {
        trace!(rule = %rule.id, "rule ended and fully materialized; skipping");
        return None;
    }

    let mut cursor = rule.cursor();
    let mut last_reached = None;
    let mut emitted = 0usize;

    loop {
        let Some(candidate) = rule.frequency.next_date(cursor) else {
            warn!(rule = %rule.id, %cursor, "date step overflowed; stopping catch-up");
            break;
        };
        if candidate > today {
            break;
        }
        cursor = candidate;
        if candidate < rule.start_date {
            continue;
        }
        if rule.end_date.is_some_and(|end| candidate > end) {
            break;
        }
        if index.insert(rule.id, candidate) {
            debug!(rule = %rule.id, date = %candidate, "materialized occurrence");
            out.push(rule.materialize(candidate));
            emitted += 1;
        } else {
            debug!(rule = %rule.id, date = %candidate, "occurrence already present");
        }
        last_reached = Some(candidate);
    }

    if emitted > 0 {
        last_reached
    } else {
        None
    }
}

/// Generation bound to a [`Clock`] so callers need not pass "today" explicitly.
pub struct RecurrenceEngine<C: Clock> {
    clock: C,
}

impl<C: Clock> RecurrenceEngine<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn run(&self, rules: &[RecurrenceRule], existing: &[Transaction]) -> GenerationOutcome {
        generate_due_transactions(rules, existing, self.clock.today())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Frequency, TransactionKind};
    use crate::time::FixedClock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly_rent() -> RecurrenceRule {
        RecurrenceRule::new(
            TransactionKind::Expense,
            1200.0,
            "Bills & Utilities",
            "Rent",
            Frequency::Monthly,
            date(2024, 1, 1),
        )
    }

    fn dates(outcome: &GenerationOutcome) -> Vec<NaiveDate> {
        outcome.transactions.iter().map(|txn| txn.date).collect()
    }

    #[test]
    fn nothing_due_before_first_period_elapses() {
        let rule = monthly_rent();
        let outcome = generate_due_transactions(&[rule.clone()], &[], date(2024, 1, 15));

        assert!(outcome.is_empty());
        assert_eq!(outcome.rules, vec![rule]);
    }

    #[test]
    fn single_catch_up_on_due_day() {
        let rule = monthly_rent();
        let outcome = generate_due_transactions(&[rule], &[], date(2024, 2, 1));

        assert_eq!(dates(&outcome), vec![date(2024, 2, 1)]);
        assert_eq!(outcome.rules[0].last_generated, Some(date(2024, 2, 1)));
    }

    #[test]
    fn multi_period_catch_up() {
        let rule = monthly_rent();
        let outcome = generate_due_transactions(&[rule], &[], date(2024, 4, 15));

        assert_eq!(
            dates(&outcome),
            vec![date(2024, 2, 1), date(2024, 3, 1), date(2024, 4, 1)]
        );
        assert_eq!(outcome.rules[0].last_generated, Some(date(2024, 4, 1)));
    }

    #[test]
    fn stops_at_end_date() {
        let rule = monthly_rent().with_end_date(date(2024, 3, 1));
        let outcome = generate_due_transactions(&[rule], &[], date(2024, 3, 1));

        assert_eq!(dates(&outcome), vec![date(2024, 2, 1), date(2024, 3, 1)]);
        assert_eq!(outcome.rules[0].last_generated, Some(date(2024, 3, 1)));
    }

    #[test]
    fn ended_rule_catches_up_to_end_date_only() {
        let rule = monthly_rent().with_end_date(date(2024, 3, 1));
        let outcome = generate_due_transactions(&[rule], &[], date(2024, 4, 15));

        assert_eq!(dates(&outcome), vec![date(2024, 2, 1), date(2024, 3, 1)]);
        assert_eq!(outcome.rules[0].last_generated, Some(date(2024, 3, 1)));
    }

    #[test]
    fn exhausted_rule_passes_through() {
        let mut rule = monthly_rent().with_end_date(date(2024, 3, 1));
        rule.last_generated = Some(date(2024, 3, 1));
        let outcome = generate_due_transactions(&[rule.clone()], &[], date(2025, 1, 1));

        assert!(outcome.is_empty());
        assert_eq!(outcome.rules, vec![rule]);
    }

    #[test]
    fn paused_rule_is_returned_unchanged() {
        let mut rule = monthly_rent();
        rule.is_active = false;
        let outcome = generate_due_transactions(&[rule.clone()], &[], date(2030, 1, 1));

        assert!(outcome.is_empty());
        assert_eq!(outcome.rules, vec![rule]);
    }

    #[test]
    fn existing_occurrence_is_not_duplicated() {
        let rule = monthly_rent();
        let existing = vec![rule.materialize(date(2024, 2, 1))];
        let outcome = generate_due_transactions(&[rule], &existing, date(2024, 4, 15));

        assert_eq!(dates(&outcome), vec![date(2024, 3, 1), date(2024, 4, 1)]);
        assert_eq!(outcome.rules[0].last_generated, Some(date(2024, 4, 1)));
    }

    #[test]
    fn all_present_leaves_bookkeeping_untouched() {
        let rule = monthly_rent();
        let existing = vec![
            rule.materialize(date(2024, 2, 1)),
            rule.materialize(date(2024, 3, 1)),
        ];
        let outcome = generate_due_transactions(&[rule.clone()], &existing, date(2024, 3, 10));

        assert!(outcome.is_empty());
        assert_eq!(outcome.rules[0].last_generated, None);
    }

    #[test]
    fn trailing_existing_occurrence_still_advances_bookkeeping() {
        let rule = monthly_rent();
        let existing = vec![rule.materialize(date(2024, 3, 1))];
        let outcome = generate_due_transactions(&[rule], &existing, date(2024, 3, 10));

        assert_eq!(dates(&outcome), vec![date(2024, 2, 1)]);
        assert_eq!(outcome.rules[0].last_generated, Some(date(2024, 3, 1)));
    }

    #[test]
    fn manual_transaction_on_same_day_does_not_count() {
        let rule = monthly_rent();
        let manual = Transaction::new(
            TransactionKind::Expense,
            1200.0,
            "Bills & Utilities",
            "Rent",
            date(2024, 2, 1),
        );
        let outcome = generate_due_transactions(&[rule], &[manual], date(2024, 2, 1));

        assert_eq!(dates(&outcome), vec![date(2024, 2, 1)]);
    }

    #[test]
    fn second_pass_over_merged_state_is_idempotent() {
        let rules = vec![
            monthly_rent(),
            RecurrenceRule::new(
                TransactionKind::Income,
                80.0,
                "Freelance",
                "Retainer",
                Frequency::Weekly,
                date(2024, 1, 3),
            ),
        ];
        let today = date(2024, 4, 15);
        let first = generate_due_transactions(&rules, &[], today);
        assert!(!first.is_empty());

        let second = generate_due_transactions(&first.rules, &first.transactions, today);
        assert!(second.is_empty());
        assert_eq!(second.rules, first.rules);
    }

    #[test]
    fn rerun_from_original_rules_with_merged_transactions_emits_nothing() {
        let rules = vec![monthly_rent()];
        let today = date(2024, 4, 15);
        let first = generate_due_transactions(&rules, &[], today);

        let again = generate_due_transactions(&rules, &first.transactions, today);
        assert!(again.is_empty());
    }

    #[test]
    fn output_ignores_transaction_order() {
        let rule = monthly_rent();
        let mut existing = vec![
            rule.materialize(date(2024, 3, 1)),
            Transaction::new(TransactionKind::Income, 5.0, "Gift", "Card", date(2024, 1, 9)),
            rule.materialize(date(2024, 5, 1)),
        ];
        let today = date(2024, 7, 2);
        let forward = generate_due_transactions(&[rule.clone()], &existing, today);
        existing.reverse();
        let backward = generate_due_transactions(&[rule], &existing, today);

        assert_eq!(forward, backward);
        assert_eq!(
            dates(&forward),
            vec![date(2024, 2, 1), date(2024, 4, 1), date(2024, 6, 1), date(2024, 7, 1)]
        );
    }

    #[test]
    fn generated_ids_are_deterministic() {
        let rule = monthly_rent();
        let today = date(2024, 4, 15);
        let a = generate_due_transactions(&[rule.clone()], &[], today);
        let b = generate_due_transactions(&[rule], &[], today);
        let ids = |o: &GenerationOutcome| o.transactions.iter().map(|t| t.id).collect::<Vec<_>>();

        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn end_before_start_never_generates() {
        let rule = monthly_rent().with_end_date(date(2023, 12, 1));
        for today in [date(2023, 11, 1), date(2023, 12, 1), date(2024, 6, 1)] {
            let outcome = generate_due_transactions(&[rule.clone()], &[], today);
            assert!(outcome.is_empty());
            assert_eq!(outcome.rules[0], rule);
        }
    }

    #[test]
    fn today_before_start_generates_nothing() {
        let rule = monthly_rent();
        let outcome = generate_due_transactions(&[rule.clone()], &[], date(2023, 6, 1));

        assert!(outcome.is_empty());
        assert_eq!(outcome.rules, vec![rule]);
    }

    #[test]
    fn invalid_amounts_pass_through_verbatim() {
        let mut rule = monthly_rent();
        rule.amount = -3.0;
        rule.category.clear();
        rule.description.clear();
        let outcome = generate_due_transactions(&[rule], &[], date(2024, 2, 1));

        let txn = &outcome.transactions[0];
        assert_eq!(txn.amount, -3.0);
        assert_eq!(txn.category, "");
        assert_eq!(txn.description, " (Auto)");
    }

    #[test]
    fn resumes_from_last_generated() {
        let mut rule = monthly_rent();
        rule.last_generated = Some(date(2024, 3, 1));
        let outcome = generate_due_transactions(&[rule], &[], date(2024, 5, 20));

        assert_eq!(dates(&outcome), vec![date(2024, 4, 1), date(2024, 5, 1)]);
        assert_eq!(outcome.rules[0].last_generated, Some(date(2024, 5, 1)));
    }

    #[test]
    fn month_end_anchor_clamps_and_stays_clamped() {
        let rule = RecurrenceRule::new(
            TransactionKind::Expense,
            30.0,
            "Bills & Utilities",
            "Phone",
            Frequency::Monthly,
            date(2024, 1, 31),
        );
        let outcome = generate_due_transactions(&[rule], &[], date(2024, 4, 30));

        assert_eq!(
            dates(&outcome),
            vec![date(2024, 2, 29), date(2024, 3, 29), date(2024, 4, 29)]
        );
    }

    #[test]
    fn rules_keep_input_order() {
        let a = monthly_rent();
        let mut b = monthly_rent();
        b.is_active = false;
        let c = RecurrenceRule::new(
            TransactionKind::Income,
            10.0,
            "Investment",
            "Dividend",
            Frequency::Yearly,
            date(2020, 6, 30),
        );
        let outcome =
            generate_due_transactions(&[a.clone(), b.clone(), c.clone()], &[], date(2024, 7, 1));

        let ids: Vec<_> = outcome.rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
        assert_eq!(outcome.generated_for(a.id), 6);
        assert_eq!(outcome.generated_for(b.id), 0);
        assert_eq!(outcome.generated_for(c.id), 4);
    }

    #[test]
    fn duplicated_rule_ids_do_not_double_emit() {
        let rule = monthly_rent();
        let outcome = generate_due_transactions(&[rule.clone(), rule], &[], date(2024, 3, 1));

        assert_eq!(outcome.transactions.len(), 2);
    }

    #[test]
    fn duplicated_rule_ids_share_bookkeeping() {
        let rule = monthly_rent();
        let mut paused = rule.clone();
        paused.is_active = false;
        let rules = [rule.clone(), rule, paused];

        let outcome = generate_due_transactions(&rules, &[], date(2024, 3, 1));
        let last: Vec<_> = outcome.rules.iter().map(|r| r.last_generated).collect();

        assert_eq!(last, vec![Some(date(2024, 3, 1)), Some(date(2024, 3, 1)), None]);
    }

    #[test]
    fn daily_catch_up_covers_every_day() {
        let rule = RecurrenceRule::new(
            TransactionKind::Expense,
            4.0,
            "Food & Dining",
            "Coffee",
            Frequency::Daily,
            date(2024, 2, 27),
        );
        let outcome = generate_due_transactions(&[rule], &[], date(2024, 3, 2));

        assert_eq!(
            dates(&outcome),
            vec![date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1), date(2024, 3, 2)]
        );
    }

    #[test]
    fn occurrence_exists_matches_rule_and_day() {
        let rule = monthly_rent();
        let txns = vec![rule.materialize(date(2024, 2, 1))];

        assert!(occurrence_exists(&txns, rule.id, date(2024, 2, 1)));
        assert!(!occurrence_exists(&txns, rule.id, date(2024, 2, 2)));
        assert!(!occurrence_exists(&txns, Uuid::new_v4(), date(2024, 2, 1)));
    }

    #[test]
    fn index_agrees_with_linear_scan() {
        let rule = monthly_rent();
        let txns = vec![
            rule.materialize(date(2024, 2, 1)),
            Transaction::new(TransactionKind::Income, 1.0, "Gift", "x", date(2024, 2, 1)),
        ];
        let index = OccurrenceIndex::from_transactions(&txns);

        assert_eq!(index.len(), 1);
        for day in [date(2024, 2, 1), date(2024, 3, 1)] {
            assert_eq!(
                index.contains(rule.id, day),
                occurrence_exists(&txns, rule.id, day)
            );
        }
    }

    #[test]
    fn engine_uses_injected_clock() {
        let engine = RecurrenceEngine::new(FixedClock(date(2024, 4, 15)));
        let outcome = engine.run(&[monthly_rent()], &[]);

        assert_eq!(engine.today(), date(2024, 4, 15));
        assert_eq!(outcome.transactions.len(), 3);
    }
}
