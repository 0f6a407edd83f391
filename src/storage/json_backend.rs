use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    errors::{Result, TrackerError},
    ledger::Ledger,
    utils::{app_data_dir, ensure_dir, ledgers_dir_in, write_atomic},
};

use super::StorageBackend;

const LEDGER_EXTENSION: &str = "json";

/// Stores each ledger as a pretty-printed JSON file under `<root>/ledgers`.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    ledgers_dir: PathBuf,
}

impl JsonStorage {
    pub fn new(root: Option<PathBuf>) -> Result<Self> {
        let root = root.unwrap_or_else(app_data_dir);
        ensure_dir(&root)?;
        let ledgers_dir = ledgers_dir_in(&root);
        ensure_dir(&ledgers_dir)?;
        Ok(Self { ledgers_dir })
    }

    pub fn new_default() -> Result<Self> {
        Self::new(None)
    }

    pub fn ledger_path(&self, name: &str) -> PathBuf {
        self.ledgers_dir
            .join(format!("{}.{}", canonical_name(name), LEDGER_EXTENSION))
    }
}

impl StorageBackend for JsonStorage {
    fn save(&self, ledger: &Ledger, name: &str) -> Result<()> {
        let path = self.ledger_path(name);
        save_ledger_to_path(ledger, &path)?;
        debug!(path = %path.display(), "ledger saved");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Ledger> {
        let path = self.ledger_path(name);
        if !path.exists() {
            return Err(TrackerError::Storage(format!(
                "ledger `{}` not found",
                name
            )));
        }
        load_ledger_from_path(&path)
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.ledgers_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.ledgers_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(LEDGER_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.ledger_path(name);
        if !path.exists() {
            return Err(TrackerError::Storage(format!(
                "ledger `{}` not found",
                name
            )));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}

pub fn save_ledger_to_path(ledger: &Ledger, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(ledger)?;
    write_atomic(path, &json)
}

pub fn load_ledger_from_path(path: &Path) -> Result<Ledger> {
    let data = fs::read_to_string(path)?;
    let ledger: Ledger = serde_json::from_str(&data)?;
    Ok(ledger)
}

/// Lower-case slug used as the on-disk file stem for a ledger name.
pub fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "ledger".into()
    } else {
        sanitized
    }
}
