//! The shell's command table and its handlers.

use std::path::Path;

use chrono::{Datelike, NaiveDate};

use crate::{
    ledger::{
        suggested_categories, Frequency, Ledger, RecurrenceRule, Transaction, TransactionKind,
    },
    storage::{canonical_name, StorageBackend},
    time::{parse_day, parse_month},
    utils::build_info,
};

use super::{
    context::{resolve_id, CommandError, CommandResult, ShellContext},
    output,
};

type Handler = fn(&mut ShellContext, &[&str]) -> CommandResult;

/// One row of the command table.
pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub about: &'static str,
    handler: Handler,
}

impl Command {
    const fn new(
        name: &'static str,
        usage: &'static str,
        about: &'static str,
        handler: Handler,
    ) -> Self {
        Self {
            name,
            usage,
            about,
            handler,
        }
    }

    pub fn run(&self, context: &mut ShellContext, args: &[&str]) -> CommandResult {
        (self.handler)(context, args)
    }
}

/// Every command in `help` order.
pub static COMMANDS: &[Command] = &[
    Command::new("help", "help [COMMAND]", "Show commands or usage for one command", cmd_help),
    Command::new("version", "version", "Show build information", cmd_version),
    Command::new("new-ledger", "new-ledger NAME", "Start an empty ledger", cmd_new_ledger),
    Command::new("load", "load NAME", "Load a saved ledger", cmd_load),
    Command::new("save", "save [NAME]", "Save the current ledger", cmd_save),
    Command::new("ledgers", "ledgers", "List saved ledgers", cmd_ledgers),
    Command::new(
        "delete-ledger",
        "delete-ledger NAME",
        "Delete a saved ledger file",
        cmd_delete_ledger,
    ),
    Command::new("export", "export PATH", "Write the current ledger to a JSON file", cmd_export),
    Command::new("import", "import PATH", "Open a ledger from a JSON file", cmd_import),
    Command::new(
        "add-txn",
        "add-txn KIND AMOUNT CATEGORY DESCRIPTION [DATE]",
        "Record a one-off transaction",
        cmd_add_transaction,
    ),
    Command::new(
        "txns",
        "txns [YYYY-MM|all] [CATEGORY]",
        "List transactions, newest first",
        cmd_transactions,
    ),
    Command::new("delete-txn", "delete-txn ID", "Delete a transaction", cmd_delete_transaction),
    Command::new(
        "add-rule",
        "add-rule KIND AMOUNT FREQUENCY START CATEGORY DESCRIPTION [END]",
        "Create a recurring transaction rule",
        cmd_add_rule,
    ),
    Command::new("rules", "rules", "List recurring rules", cmd_rules),
    Command::new("toggle-rule", "toggle-rule ID", "Pause or resume a rule", cmd_toggle_rule),
    Command::new(
        "delete-rule",
        "delete-rule ID",
        "Delete a rule and every transaction it generated",
        cmd_delete_rule,
    ),
    Command::new(
        "generate",
        "generate [DATE]",
        "Materialize recurring transactions due by DATE (default today)",
        cmd_generate,
    ),
    Command::new(
        "summary",
        "summary [YYYY-MM|all] [CATEGORY]",
        "Show income, expense and net totals",
        cmd_summary,
    ),
    Command::new(
        "budgets",
        "budgets [YYYY-MM]",
        "Show expense spending against budgets for a month",
        cmd_budgets,
    ),
    Command::new(
        "set-budget",
        "set-budget CATEGORY LIMIT",
        "Set or replace a category's monthly limit",
        cmd_set_budget,
    ),
    Command::new(
        "delete-budget",
        "delete-budget CATEGORY",
        "Remove a category budget",
        cmd_delete_budget,
    ),
    Command::new(
        "categories",
        "categories [income|expense]",
        "List suggested categories",
        cmd_categories,
    ),
    Command::new("config", "config [KEY VALUE]", "Show or change settings", cmd_config),
    Command::new("exit", "exit", "Leave the shell", cmd_exit),
];

pub fn find(name: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|command| command.name == name)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    COMMANDS.iter().map(|command| command.name)
}

fn usage(name: &str) -> CommandError {
    let text = find(name).map(|command| command.usage).unwrap_or(name);
    CommandError::InvalidArguments(format!("usage: {}", text))
}

fn parse_kind(raw: &str) -> Result<TransactionKind, CommandError> {
    Ok(raw.parse::<TransactionKind>()?)
}

fn parse_amount(raw: &str) -> Result<f64, CommandError> {
    raw.trim()
        .trim_start_matches('$')
        .parse::<f64>()
        .map_err(|_| CommandError::InvalidArguments(format!("`{}` is not a number", raw)))
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, CommandError> {
    parse_day(raw).ok_or_else(|| {
        CommandError::InvalidArguments(format!("`{}` is not a date (use YYYY-MM-DD)", raw))
    })
}

/// Reads `[YYYY-MM|all] [CATEGORY]`; a single argument that is not a month is
/// taken as the category.
fn parse_filter<'a>(args: &[&'a str]) -> Option<(Option<(i32, u32)>, Option<&'a str>)> {
    let month_arg = |raw: &str| -> Option<Option<(i32, u32)>> {
        if raw.eq_ignore_ascii_case("all") {
            Some(None)
        } else {
            parse_month(raw).map(Some)
        }
    };
    let category_arg = |raw: &'a str| (!raw.eq_ignore_ascii_case("all")).then_some(raw);
    match args {
        [] => Some((None, None)),
        [only] => match month_arg(only) {
            Some(month) => Some((month, None)),
            None => Some((None, category_arg(*only))),
        },
        [month, category] => Some((month_arg(month)?, category_arg(*category))),
        _ => None,
    }
}

fn format_amount(context: &ShellContext, amount: f64) -> String {
    format!("{:.2} {}", amount, context.config.currency)
}

fn short_id(id: uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn cmd_help(_context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if let Some(name) = args.first() {
        let command = find(&name.to_lowercase()).ok_or_else(|| {
            CommandError::InvalidArguments(format!("unknown command `{}`", name))
        })?;
        output::info(format!("{}: {}", command.name, command.about));
        output::info(format!("usage: {}", command.usage));
        return Ok(());
    }
    output::section("Commands");
    let rows: Vec<Vec<String>> = COMMANDS
        .iter()
        .map(|command| vec![command.usage.to_string(), command.about.to_string()])
        .collect();
    output::render_table(&["Usage", "Description"], &rows);
    Ok(())
}

fn cmd_version(_context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    output::info(build_info::current().summary());
    Ok(())
}

fn cmd_new_ledger(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [name] = args else {
        return Err(usage("new-ledger"));
    };
    context.set_ledger(Ledger::new(*name), Some(name.to_string()));
    output::success(format!("New ledger `{}` created.", name));
    Ok(())
}

fn cmd_load(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [name] = args else {
        return Err(usage("load"));
    };
    let ledger = context.storage.load(name)?;
    output::success(format!(
        "Loaded ledger `{}` ({} transactions, {} rules).",
        ledger.name,
        ledger.transactions.len(),
        ledger.rules.len()
    ));
    context.set_ledger(ledger, Some(name.to_string()));
    context.config.last_opened_ledger = Some(name.to_string());
    context.persist_config()
}

fn cmd_save(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let name = match args {
        [] => context
            .ledger_name
            .clone()
            .ok_or_else(|| usage("save"))?,
        [name] => name.to_string(),
        _ => return Err(usage("save")),
    };
    context.with_ledger(|ledger| Ok(context.storage.save(ledger, &name)?))?;
    output::success(format!(
        "Ledger saved to {}.",
        context.storage.ledger_path(&name).display()
    ));
    context.ledger_name = Some(name.clone());
    context.config.last_opened_ledger = Some(name);
    context.persist_config()
}

fn cmd_ledgers(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let names = context.storage.list()?;
    if names.is_empty() {
        output::info("No saved ledgers.");
        return Ok(());
    }
    output::section("Ledgers");
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_delete_ledger(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [name] = args else {
        return Err(usage("delete-ledger"));
    };
    context.storage.delete(name)?;
    output::success(format!("Deleted saved ledger `{}`.", name));

    let slug = canonical_name(name);
    if context.ledger_name.as_deref().map(canonical_name) == Some(slug.clone()) {
        output::hint("The ledger is still open; `save` writes it back.");
    }
    if context.config.last_opened_ledger.as_deref().map(canonical_name) == Some(slug) {
        context.config.last_opened_ledger = None;
        context.persist_config()?;
    }
    Ok(())
}

fn cmd_export(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [path] = args else {
        return Err(usage("export"));
    };
    let path = Path::new(path);
    context.with_ledger(|ledger| Ok(context.storage.save_to_path(ledger, path)?))?;
    output::success(format!("Ledger exported to {}.", path.display()));
    Ok(())
}

fn cmd_import(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [path] = args else {
        return Err(usage("import"));
    };
    let ledger = context.storage.load_from_path(Path::new(path))?;
    let name = ledger.name.clone();
    output::success(format!(
        "Imported ledger `{}` ({} transactions, {} rules).",
        name,
        ledger.transactions.len(),
        ledger.rules.len()
    ));
    context.set_ledger(ledger, Some(name));
    Ok(())
}

fn cmd_add_transaction(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (kind, amount, category, description, date) = match args {
        [kind, amount, category, description] => (kind, amount, category, description, None),
        [kind, amount, category, description, date] => {
            (kind, amount, category, description, Some(*date))
        }
        _ => return Err(usage("add-txn")),
    };
    let kind = parse_kind(kind)?;
    let amount = parse_amount(amount)?;
    let date = match date {
        Some(raw) => parse_date_arg(raw)?,
        None => context.today(),
    };
    let transaction = Transaction::new(kind, amount, *category, *description, date);
    let id = context.with_ledger_mut(|ledger| Ok(ledger.add_transaction(transaction)?))?;
    output::success(format!("Transaction {} recorded.", short_id(id)));
    context.auto_reconcile();
    Ok(())
}

fn cmd_transactions(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (month, category) = parse_filter(args).ok_or_else(|| usage("txns"))?;
    let rows = context.with_ledger(|ledger| {
        Ok(ledger
            .filtered(month, category)
            .into_iter()
            .map(|txn| {
                vec![
                    short_id(txn.id),
                    txn.date.to_string(),
                    txn.kind.to_string(),
                    format_amount(context, txn.amount),
                    txn.category.clone(),
                    txn.description.clone(),
                ]
            })
            .collect::<Vec<_>>())
    })?;
    if rows.is_empty() {
        output::info("No matching transactions.");
        return Ok(());
    }
    output::render_table(
        &["Id", "Date", "Kind", "Amount", "Category", "Description"],
        &rows,
    );
    Ok(())
}

fn cmd_delete_transaction(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [raw] = args else {
        return Err(usage("delete-txn"));
    };
    let removed = context.with_ledger_mut(|ledger| {
        let id = resolve_id(raw, ledger.transactions.iter().map(|t| t.id), "transaction")?;
        Ok(ledger.remove_transaction(id)?)
    })?;
    output::success(format!(
        "Deleted transaction {} ({} on {}).",
        short_id(removed.id),
        removed.description,
        removed.date
    ));
    Ok(())
}

fn cmd_add_rule(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (kind, amount, frequency, start, category, description, end) = match args {
        [kind, amount, frequency, start, category, description] => {
            (kind, amount, frequency, start, category, description, None)
        }
        [kind, amount, frequency, start, category, description, end] => {
            (kind, amount, frequency, start, category, description, Some(*end))
        }
        _ => return Err(usage("add-rule")),
    };
    let mut rule = RecurrenceRule::new(
        parse_kind(kind)?,
        parse_amount(amount)?,
        *category,
        *description,
        frequency.parse::<Frequency>()?,
        parse_date_arg(start)?,
    );
    if let Some(raw) = end {
        rule = rule.with_end_date(parse_date_arg(raw)?);
    }
    let id = context.with_ledger_mut(|ledger| Ok(ledger.add_rule(rule)?))?;
    output::success(format!("Rule {} created.", short_id(id)));
    context.auto_reconcile();
    Ok(())
}

fn cmd_rules(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let today = context.today();
    let rows = context.with_ledger(|ledger| {
        Ok(ledger
            .rules
            .iter()
            .map(|rule| {
                let status = if !rule.is_active {
                    "paused"
                } else if rule.is_exhausted(today) {
                    "ended"
                } else {
                    "active"
                };
                vec![
                    short_id(rule.id),
                    rule.kind.to_string(),
                    format_amount(context, rule.amount),
                    rule.frequency.to_string(),
                    rule.start_date.to_string(),
                    rule.end_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                    rule.last_generated
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".into()),
                    status.to_string(),
                    rule.description.clone(),
                ]
            })
            .collect::<Vec<_>>())
    })?;
    if rows.is_empty() {
        output::info("No recurring rules yet.");
        return Ok(());
    }
    output::render_table(
        &[
            "Id", "Kind", "Amount", "Frequency", "Start", "End", "Last", "Status", "Description",
        ],
        &rows,
    );
    Ok(())
}

fn cmd_toggle_rule(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [raw] = args else {
        return Err(usage("toggle-rule"));
    };
    let (id, active) = context.with_ledger_mut(|ledger| {
        let id = resolve_id(raw, ledger.rules.iter().map(|r| r.id), "rule")?;
        Ok((id, ledger.toggle_rule(id)?))
    })?;
    let state = if active { "resumed" } else { "paused" };
    output::success(format!("Rule {} {}.", short_id(id), state));
    context.auto_reconcile();
    Ok(())
}

fn cmd_delete_rule(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [raw] = args else {
        return Err(usage("delete-rule"));
    };
    let (rule, removed) = context.with_ledger_mut(|ledger| {
        let id = resolve_id(raw, ledger.rules.iter().map(|r| r.id), "rule")?;
        Ok(ledger.remove_rule(id)?)
    })?;
    output::success(format!(
        "Deleted rule {} and {} generated transaction(s).",
        short_id(rule.id),
        removed
    ));
    Ok(())
}

fn cmd_generate(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let today = match args {
        [] => context.today(),
        [raw] => parse_date_arg(raw)?,
        _ => return Err(usage("generate")),
    };
    let report = context.with_ledger_mut(|ledger| Ok(ledger.reconcile(today)))?;
    output::success(format!(
        "Generated {} transaction(s) due by {}.",
        report.total(),
        today
    ));
    Ok(())
}

fn cmd_summary(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (month, category) = parse_filter(args).ok_or_else(|| usage("summary"))?;
    let totals = context.with_ledger(|ledger| Ok(ledger.totals_for(month, category)))?;
    let scope = match (month, category) {
        (None, None) => "Summary".to_string(),
        (Some((year, month)), None) => format!("Summary {:04}-{:02}", year, month),
        (None, Some(category)) => format!("Summary {}", category),
        (Some((year, month)), Some(category)) => {
            format!("Summary {:04}-{:02} {}", year, month, category)
        }
    };
    output::section(scope);
    output::render_table(
        &["Income", "Expense", "Net"],
        &[vec![
            format_amount(context, totals.income),
            format_amount(context, totals.expense),
            format_amount(context, totals.net),
        ]],
    );
    Ok(())
}

fn cmd_budgets(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (year, month) = match args {
        [] => {
            let today = context.today();
            (today.year(), today.month())
        }
        [raw] => parse_month(raw).ok_or_else(|| usage("budgets"))?,
        _ => return Err(usage("budgets")),
    };
    let rows = context.with_ledger(|ledger| {
        Ok(ledger
            .month_spending(year, month)
            .into_iter()
            .map(|row| {
                let status = match row.limit {
                    None => "no budget",
                    Some(_) if row.is_over() => "over",
                    Some(_) => "ok",
                };
                vec![
                    row.category.clone(),
                    format_amount(context, row.spent),
                    row.limit
                        .map(|limit| format_amount(context, limit))
                        .unwrap_or_else(|| "-".into()),
                    row.remaining()
                        .map(|left| format_amount(context, left))
                        .unwrap_or_else(|| "-".into()),
                    status.to_string(),
                ]
            })
            .collect::<Vec<_>>())
    })?;
    output::section(format!("Budgets {:04}-{:02}", year, month));
    if rows.is_empty() {
        output::info("No budgets or expenses this month.");
        return Ok(());
    }
    output::render_table(&["Category", "Spent", "Limit", "Remaining", "Status"], &rows);
    Ok(())
}

fn cmd_set_budget(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [category, limit] = args else {
        return Err(usage("set-budget"));
    };
    let limit = parse_amount(limit)?;
    let replaced = context.with_ledger_mut(|ledger| Ok(ledger.set_budget(category, limit)?))?;
    let verb = if replaced { "updated" } else { "set" };
    output::success(format!(
        "Budget for `{}` {} to {}.",
        category.trim(),
        verb,
        format_amount(context, limit)
    ));
    Ok(())
}

fn cmd_delete_budget(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [category] = args else {
        return Err(usage("delete-budget"));
    };
    let removed = context.with_ledger_mut(|ledger| Ok(ledger.remove_budget(category)?))?;
    output::success(format!("Budget for `{}` removed.", removed.category));
    Ok(())
}

fn cmd_categories(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let kinds = match args {
        [] => vec![TransactionKind::Expense, TransactionKind::Income],
        [raw] => vec![parse_kind(raw)?],
        _ => return Err(usage("categories")),
    };
    for kind in kinds {
        output::section(kind);
        for name in suggested_categories(kind) {
            println!("{}", name);
        }
    }
    Ok(())
}

fn cmd_config(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    match args {
        [] => {
            let rows: Vec<Vec<String>> = context
                .config
                .entries()
                .into_iter()
                .map(|(key, value)| vec![key.to_string(), value])
                .collect();
            output::render_table(&["Key", "Value"], &rows);
            Ok(())
        }
        [key, value] => {
            context.config.set(key, value)?;
            context.persist_config()?;
            output::success(format!("`{}` set to `{}`.", key, value));
            Ok(())
        }
        _ => Err(usage("config")),
    }
}

fn cmd_exit(_context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    Err(CommandError::ExitRequested)
}
