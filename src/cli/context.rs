//! Shell state, dispatch, and error reporting.

use std::{env, io};

use chrono::NaiveDate;
use rustyline::error::ReadlineError;
use strsim::levenshtein;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{Config, ConfigManager},
    errors::TrackerError,
    ledger::Ledger,
    storage::{JsonStorage, StorageBackend},
    time::{parse_day, Clock, FixedClock, SystemClock},
};

use super::{commands, output};

/// Pins "today" for the shell, mainly for scripted runs.
pub const TODAY_ENV: &str = "TRACKER_CORE_TODAY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

/// Fatal shell errors that end the session.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] TrackerError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Readline(#[from] ReadlineError),
    #[error("invalid value for TRACKER_CORE_TODAY: `{0}`")]
    InvalidToday(String),
}

/// Per-command failures, reported and then the shell carries on.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No ledger loaded. Use `new-ledger` or `load` first.")]
    LedgerNotLoaded,
    #[error("{0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Core(#[from] TrackerError),
    #[error("exit requested")]
    ExitRequested,
}

pub type CommandResult = Result<(), CommandError>;

pub struct ShellContext {
    pub mode: CliMode,
    pub storage: JsonStorage,
    pub config_manager: ConfigManager,
    pub config: Config,
    pub clock: Box<dyn Clock>,
    pub ledger: Option<Ledger>,
    pub ledger_name: Option<String>,
    pub running: bool,
}

impl ShellContext {
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        let storage = JsonStorage::new_default()?;
        let config_manager = ConfigManager::new()?;
        let config = config_manager.load()?;
        let clock: Box<dyn Clock> = match env::var(TODAY_ENV) {
            Ok(raw) => {
                let day = parse_day(&raw).ok_or(CliError::InvalidToday(raw))?;
                Box::new(FixedClock(day))
            }
            Err(_) => Box::new(SystemClock),
        };

        let mut context = Self {
            mode,
            storage,
            config_manager,
            config,
            clock,
            ledger: None,
            ledger_name: None,
            running: true,
        };
        context.auto_load_last();
        Ok(context)
    }

    fn auto_load_last(&mut self) {
        if self.mode != CliMode::Interactive {
            return;
        }
        let Some(name) = self.config.last_opened_ledger.clone() else {
            return;
        };
        match self.storage.load(&name) {
            Ok(ledger) => {
                output::info(format!("Reopened ledger `{}`.", name));
                self.set_ledger(ledger, Some(name));
            }
            Err(err) => output::warning(format!("Could not reopen `{}`: {}", name, err)),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn prompt(&self) -> String {
        match &self.ledger {
            Some(ledger) => format!("tracker [{}]> ", ledger.name),
            None => "tracker> ".into(),
        }
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        commands::names().collect()
    }

    /// Installs `ledger` as the current one, reconciling it when configured to.
    pub fn set_ledger(&mut self, ledger: Ledger, name: Option<String>) {
        self.ledger = Some(ledger);
        self.ledger_name = name;
        self.auto_reconcile();
    }

    pub fn auto_reconcile(&mut self) {
        if !self.config.auto_reconcile {
            return;
        }
        let today = self.today();
        if let Some(ledger) = self.ledger.as_mut() {
            let report = ledger.reconcile(today);
            if report.total() > 0 {
                output::info(format!(
                    "Generated {} recurring transaction(s) due by {}.",
                    report.total(),
                    today
                ));
            }
        }
    }

    pub fn with_ledger<T>(
        &self,
        f: impl FnOnce(&Ledger) -> Result<T, CommandError>,
    ) -> Result<T, CommandError> {
        let ledger = self.ledger.as_ref().ok_or(CommandError::LedgerNotLoaded)?;
        f(ledger)
    }

    pub fn with_ledger_mut<T>(
        &mut self,
        f: impl FnOnce(&mut Ledger) -> Result<T, CommandError>,
    ) -> Result<T, CommandError> {
        let ledger = self.ledger.as_mut().ok_or(CommandError::LedgerNotLoaded)?;
        f(ledger)
    }

    pub fn persist_config(&self) -> CommandResult {
        self.config_manager.save(&self.config)?;
        Ok(())
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        let Some(entry) = commands::find(command) else {
            self.suggest_command(raw);
            return Ok(LoopControl::Continue);
        };
        match entry.run(self, args) {
            Ok(()) => Ok(LoopControl::Continue),
            Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));
        let best = commands::names()
            .map(|name| (levenshtein(name, &input.to_lowercase()), name))
            .min_by_key(|(distance, _)| *distance);
        if let Some((distance, name)) = best {
            if distance <= 3 {
                output::hint(format!("Did you mean `{}`?", name));
            }
        }
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::ExitRequested => {}
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::hint("Use `help <command>` for usage details.");
            }
            CommandError::LedgerNotLoaded => {
                output::error(CommandError::LedgerNotLoaded);
                output::hint("Try `new-ledger Household` to get started.");
            }
            other => output::error(other),
        }
    }
}

/// Resolves a full id or a unique id prefix against `ids`.
pub fn resolve_id<I>(input: &str, ids: I, what: &str) -> Result<Uuid, CommandError>
where
    I: IntoIterator<Item = Uuid>,
{
    let needle = input.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(CommandError::InvalidArguments(format!("{} id is required", what)));
    }
    let matches: Vec<Uuid> = ids
        .into_iter()
        .filter(|id| id.to_string().starts_with(&needle))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(CommandError::InvalidArguments(format!(
            "no {} matches `{}`",
            what, input
        ))),
        _ => Err(CommandError::InvalidArguments(format!(
            "`{}` matches {} {}s; use a longer prefix",
            input,
            matches.len(),
            what
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_id_accepts_unique_prefix() {
        let a = Uuid::parse_str("aaaa0000-0000-0000-0000-000000000001").unwrap();
        let b = Uuid::parse_str("aabb0000-0000-0000-0000-000000000002").unwrap();

        assert_eq!(resolve_id("aaaa", [a, b], "rule").unwrap(), a);
        assert_eq!(resolve_id("AABB", [a, b], "rule").unwrap(), b);
        assert!(matches!(
            resolve_id("aa", [a, b], "rule"),
            Err(CommandError::InvalidArguments(_))
        ));
        assert!(resolve_id("ff", [a, b], "rule").is_err());
        assert!(resolve_id(" ", [a, b], "rule").is_err());
    }
}
