//! Engine configuration, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CircuitGuardError;
use crate::tables::ReferenceTables;

fn default_debounce_ms() -> u64 {
    300
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Debounce window for live validation.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Upper bound on cached results; `None` keeps everything until cleared.
    pub max_cache_entries: Option<usize>,
    /// Rule codes to skip.
    pub disabled_rules: Vec<String>,
    /// JSON file replacing the builtin reference tables.
    pub tables_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_cache_entries: None,
            disabled_rules: vec![],
            tables_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, CircuitGuardError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, CircuitGuardError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Reference tables named by `tables_path`, or the builtin ones.
    pub fn load_tables(&self) -> Result<ReferenceTables, CircuitGuardError> {
        match &self.tables_path {
            Some(path) => ReferenceTables::load(path),
            None => Ok(ReferenceTables::builtin()),
        }
    }
}
