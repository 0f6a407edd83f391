use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    errors::{Result, TrackerError},
    utils::{app_data_dir, config_file_in, ensure_dir, write_atomic},
};

/// User preferences persisted alongside the ledgers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub locale: String,
    pub currency: String,
    /// Run the recurrence engine whenever a ledger is loaded or changed.
    #[serde(default = "Config::default_auto_reconcile")]
    pub auto_reconcile: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_opened_ledger: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: "en-US".into(),
            currency: "USD".into(),
            auto_reconcile: true,
            last_opened_ledger: None,
        }
    }
}

impl Config {
    pub const KEYS: [&'static str; 3] = ["locale", "currency", "auto_reconcile"];

    fn default_auto_reconcile() -> bool {
        true
    }

    /// Updates a single setting from its textual form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "locale" => self.locale = non_empty(key, value)?,
            "currency" => self.currency = non_empty(key, value)?.to_ascii_uppercase(),
            "auto_reconcile" => {
                self.auto_reconcile = bool::from_str(value.trim()).map_err(|_| {
                    TrackerError::Config(format!(
                        "`auto_reconcile` expects true or false, got `{}`",
                        value
                    ))
                })?
            }
            other => {
                return Err(TrackerError::Config(format!(
                    "unknown setting `{}` (known: {})",
                    other,
                    Self::KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("locale", self.locale.clone()),
            ("currency", self.currency.clone()),
            ("auto_reconcile", self.auto_reconcile.to_string()),
        ]
    }
}

fn non_empty(key: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TrackerError::Config(format!("`{}` cannot be empty", key)));
    }
    Ok(trimmed.to_string())
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::with_base_dir(app_data_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self> {
        ensure_dir(&base)?;
        Ok(Self {
            path: config_file_in(&base),
        })
    }

    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        let data = fs::read_to_string(&self.path)?;
        serde_json::from_str(&data).map_err(|err| {
            TrackerError::Config(format!("{}: {}", self.path.display(), err))
        })
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.path, &json)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
