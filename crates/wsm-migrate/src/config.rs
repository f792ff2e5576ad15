use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, MigrationResult};
use crate::rules::RuleSet;

/// Settings for one migration run.
///
/// Every field has a default, so a config file only needs the values it
/// changes. The defaults are the safe ones: a dry run with all legacy
/// cleanup enabled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Compute and report every change without writing to the store.
    pub dry_run: bool,
    /// Leave `NO_WORKSPACE` id fixes out of the change log. They are still
    /// written.
    pub suppress_no_workspace_id_change_output: bool,
    /// Legacy cleanup rules to apply.
    pub rules: RuleSet,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            suppress_no_workspace_id_change_output: true,
            rules: RuleSet::full(),
        }
    }
}

impl MigrationConfig {
    /// A configuration that writes its changes.
    pub fn commit() -> Self {
        Self {
            dry_run: false,
            ..Default::default()
        }
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn from_toml_str(text: &str) -> MigrationResult<Self> {
        toml::from_str(text).map_err(|e| MigrationError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> MigrationResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MigrationError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> MigrationResult<String> {
        toml::to_string(self).map_err(|e| MigrationError::Config(e.to_string()))
    }
}
