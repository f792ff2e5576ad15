//! Rename maps shared between stages of one run.
//!
//! [`TypeRenameMap`] is built once from every type name in use and is the
//! only source of canonical type names. [`RenameLedger`] is filled while
//! workspace indexes are rebuilt and replayed against stored object
//! versions. Neither is persisted.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::error::{MigrationError, MigrationResult};
use crate::sanitize::{sanitize, CharClass};

/// Injective map from raw type names to canonical type names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeRenameMap {
    names: BTreeMap<String, String>,
}

impl TypeRenameMap {
    /// Sanitize every name and check that no two distinct names collide.
    ///
    /// Names are processed in sorted order, so the collision reported for a
    /// given input is always the same pair.
    pub fn build<I, S>(names: I) -> MigrationResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sorted: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let mut claimed: BTreeMap<String, String> = BTreeMap::new();
        let mut map = BTreeMap::new();
        for raw in sorted {
            let canonical = sanitize(&raw, CharClass::TypeName);
            if let Some(first) = claimed.get(&canonical) {
                return Err(MigrationError::TypeNameCollision {
                    first: first.clone(),
                    second: raw,
                    canonical,
                });
            }
            claimed.insert(canonical.clone(), raw.clone());
            map.insert(raw, canonical);
        }
        Ok(Self { names: map })
    }

    /// Canonical name for `raw`, if known.
    pub fn get(&self, raw: &str) -> Option<&str> {
        self.names.get(raw).map(String::as_str)
    }

    /// Canonical name for `raw`, or [`MigrationError::UnknownType`].
    pub fn require(&self, raw: &str, referenced_by: impl FnOnce() -> String) -> MigrationResult<&str> {
        self.get(raw).ok_or_else(|| MigrationError::UnknownType {
            type_name: raw.to_string(),
            referenced_by: referenced_by(),
        })
    }

    /// Pairs whose canonical name differs from the raw name, in raw order.
    pub fn renames(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names
            .iter()
            .filter(|(raw, canonical)| raw != canonical)
            .map(|(raw, canonical)| (raw.as_str(), canonical.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Where a renamed object ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    pub final_id: String,
    pub version_token: Value,
}

/// `workspace → raw object id → canonical type → final identity`.
///
/// Raw ids are the unescaped ids as found in the workspace index before
/// sanitizing, which is also how stored object versions name them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenameLedger {
    entries: BTreeMap<String, BTreeMap<String, BTreeMap<String, LedgerEntry>>>,
    len: usize,
}

impl RenameLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rename. Returns `false` if the key was already present, in
    /// which case the ledger is left unchanged.
    pub fn record(
        &mut self,
        workspace: &str,
        raw_id: &str,
        type_name: &str,
        final_id: impl Into<String>,
        version_token: Value,
    ) -> bool {
        let slot = self
            .entries
            .entry(workspace.to_string())
            .or_default()
            .entry(raw_id.to_string())
            .or_default();
        if slot.contains_key(type_name) {
            return false;
        }
        slot.insert(
            type_name.to_string(),
            LedgerEntry {
                final_id: final_id.into(),
                version_token,
            },
        );
        self.len += 1;
        true
    }

    pub fn lookup(&self, workspace: &str, raw_id: &str, type_name: &str) -> Option<&LedgerEntry> {
        self.entries.get(workspace)?.get(raw_id)?.get(type_name)
    }

    /// Every entry as `(workspace, raw id, type, entry)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str, &LedgerEntry)> {
        self.entries.iter().flat_map(|(ws, ids)| {
            ids.iter().flat_map(move |(id, types)| {
                types
                    .iter()
                    .map(move |(t, e)| (ws.as_str(), id.as_str(), t.as_str(), e))
            })
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
