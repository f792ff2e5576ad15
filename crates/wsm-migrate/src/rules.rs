//! Legacy cleanup rules.
//!
//! Successive schema upgrades added cleanup for data written by older,
//! buggier versions of the service. Rather than one copy of the algorithm
//! per upgrade, each cleanup is a [`LegacyRule`] and a run enables a
//! [`RuleSet`] of them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single legacy-corruption cleanup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyRule {
    /// Delete workspaces whose id is an integer literal, and flag public
    /// workspaces with such ids.
    IntegerWorkspaces,
    /// Drop user permission entries keyed by integer workspace ids.
    IntegerPermissions,
    /// Drop object index entries whose id is an integer literal.
    IntegerObjectIds,
    /// Delete object versions whose workspace or id is an integer literal.
    IntegerInstances,
}

impl LegacyRule {
    pub const ALL: [LegacyRule; 4] = [
        LegacyRule::IntegerWorkspaces,
        LegacyRule::IntegerPermissions,
        LegacyRule::IntegerObjectIds,
        LegacyRule::IntegerInstances,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::IntegerWorkspaces => "integer-workspaces",
            Self::IntegerPermissions => "integer-permissions",
            Self::IntegerObjectIds => "integer-object-ids",
            Self::IntegerInstances => "integer-instances",
        }
    }
}

impl fmt::Display for LegacyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The legacy rules enabled for a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: BTreeSet<LegacyRule>,
}

impl RuleSet {
    /// No legacy cleanup: the 0.0.3 to 0.0.4 upgrade.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Every cleanup rule: the 0.0.4 to 0.0.5 upgrade.
    pub fn full() -> Self {
        LegacyRule::ALL.into_iter().collect()
    }

    /// Look a preset up by name or by the schema version it upgrades to.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "baseline" | "0.0.4" => Some(Self::baseline()),
            "full" | "0.0.5" => Some(Self::full()),
            _ => None,
        }
    }

    pub fn is_active(&self, rule: LegacyRule) -> bool {
        self.rules.contains(&rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = LegacyRule> + '_ {
        self.rules.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<LegacyRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = LegacyRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rules.is_empty() {
            return f.write_str("(none)");
        }
        let names: Vec<_> = self.iter().map(LegacyRule::name).collect();
        f.write_str(&names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_enables_every_rule() {
        let full = RuleSet::full();
        for rule in LegacyRule::ALL {
            assert!(full.is_active(rule));
        }
        assert!(RuleSet::baseline().is_empty());
    }

    #[test]
    fn presets_by_name_and_version() {
        assert_eq!(RuleSet::preset("0.0.5"), Some(RuleSet::full()));
        assert_eq!(RuleSet::preset("baseline"), Some(RuleSet::baseline()));
        assert_eq!(RuleSet::preset("0.0.9"), None);
    }

    #[test]
    fn collected_rules_compose() {
        let rules: RuleSet = [LegacyRule::IntegerInstances, LegacyRule::IntegerInstances]
            .into_iter()
            .collect();
        assert!(rules.is_active(LegacyRule::IntegerInstances));
        assert!(!rules.is_active(LegacyRule::IntegerWorkspaces));
        assert_eq!(rules.to_string(), "integer-instances");
    }

    #[test]
    fn serializes_as_kebab_case_list() {
        let rules: RuleSet = [LegacyRule::IntegerObjectIds].into_iter().collect();
        let json = serde_json::to_string(&rules).unwrap();
        assert_eq!(json, "[\"integer-object-ids\"]");
        let back: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rules);
    }

    #[test]
    fn display_of_empty_set() {
        assert_eq!(RuleSet::baseline().to_string(), "(none)");
    }
}
