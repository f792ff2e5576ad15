//! The migration pipeline stages.
//!
//! Stages run in a fixed order and hand state forward through a shared
//! [`StageContext`]: the public workspace set, the type rename map and the
//! rename ledger. A stage never re-reads a collection an earlier stage of
//! the same run has written.

pub mod instances;
pub mod permissions;
pub mod public;
pub mod types;
pub mod workspaces;

use std::collections::BTreeSet;

use serde_json::Value;
use wsm_store::{DocumentStore, Filter};
use wsm_types::{Collection, Document, RawId, StoredRecord, TypeError};

use crate::changelog::ChangeLog;
use crate::config::MigrationConfig;
use crate::driver::MigrationPhase;
use crate::error::MigrationResult;
use crate::ledger::{RenameLedger, TypeRenameMap};

pub use instances::RewriteInstances;
pub use permissions::NormalizePermissions;
pub use public::LoadPublicSet;
pub use types::NormalizeTypes;
pub use workspaces::RebuildWorkspaceIndexes;

// ---------------------------------------------------------------------------
// StageStats
// ---------------------------------------------------------------------------

/// Per-stage document counters.
///
/// Counts describe what the stage did or, in a dry run, would have done.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageStats {
    pub scanned: usize,
    pub modified: usize,
    pub deleted: usize,
}

impl std::ops::AddAssign for StageStats {
    fn add_assign(&mut self, other: Self) {
        self.scanned += other.scanned;
        self.modified += other.modified;
        self.deleted += other.deleted;
    }
}

// ---------------------------------------------------------------------------
// StageContext
// ---------------------------------------------------------------------------

/// State shared by the stages of one run.
pub struct StageContext<'a> {
    pub store: &'a dyn DocumentStore,
    pub config: &'a MigrationConfig,
    pub log: ChangeLog,
    /// Ids of the workspaces owned by the public user.
    pub public_workspaces: BTreeSet<String>,
    pub type_map: TypeRenameMap,
    pub ledger: RenameLedger,
}

impl<'a> StageContext<'a> {
    pub fn new(store: &'a dyn DocumentStore, config: &'a MigrationConfig) -> Self {
        Self {
            store,
            config,
            log: ChangeLog::new(),
            public_workspaces: BTreeSet::new(),
            type_map: TypeRenameMap::default(),
            ledger: RenameLedger::new(),
        }
    }

    /// Decode every record matching `filter` from a snapshot scan.
    pub fn snapshot<R: StoredRecord + 'a>(
        &self,
        filter: &Filter,
    ) -> MigrationResult<impl Iterator<Item = MigrationResult<R>> + 'a> {
        let store: &'a dyn DocumentStore = self.store;
        let cursor = store.scan_snapshot(R::COLLECTION, filter, None)?;
        Ok(cursor.map(|doc| -> MigrationResult<R> { Ok(R::from_document(doc?)?) }))
    }

    /// Write `record` back unless this is a dry run. Returns whether a
    /// write happened.
    pub fn persist<R: StoredRecord>(&self, record: &R) -> MigrationResult<bool> {
        if self.config.dry_run {
            return Ok(false);
        }
        self.store.save(R::COLLECTION, record.to_document()?)?;
        Ok(true)
    }

    /// Remove the matching documents unless this is a dry run.
    pub fn delete(&self, collection: Collection, filter: &Filter) -> MigrationResult<usize> {
        if self.config.dry_run {
            return Ok(0);
        }
        Ok(self.store.remove(collection, filter)?)
    }
}

// ---------------------------------------------------------------------------
// MigrationStage trait
// ---------------------------------------------------------------------------

/// One step of the migration pipeline.
///
/// Object-safe so the driver can hold a `Vec<Box<dyn MigrationStage>>`.
pub trait MigrationStage: Send + Sync {
    /// Short name used in reports and logs.
    fn name(&self) -> &str;

    /// The phase the run is in once this stage has completed.
    fn phase(&self) -> MigrationPhase;

    fn run(&self, ctx: &mut StageContext<'_>) -> MigrationResult<StageStats>;
}

/// Read an identifier field of a projected document as a [`RawId`].
pub(crate) fn raw_id_field(
    doc: &Document,
    collection: Collection,
    field: &str,
) -> MigrationResult<RawId> {
    let value = doc.get(field).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| {
        TypeError::Schema {
            collection: collection.name().to_string(),
            reason: format!("field `{field}`: {e}"),
        }
        .into()
    })
}

/// Read a string field of a projected document.
pub(crate) fn text_field(
    doc: &Document,
    collection: Collection,
    field: &str,
) -> MigrationResult<String> {
    match doc.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        other => Err(TypeError::Schema {
            collection: collection.name().to_string(),
            reason: format!("field `{field}` is not a string: {other:?}"),
        }
        .into()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use serde_json::Value;
    use wsm_store::{DocumentStore, InMemoryDocumentStore};
    use wsm_types::{StoredRecord, KEY_FIELD};

    /// Save records keyed by position, so scans return them in the order
    /// given.
    pub fn seed<R: StoredRecord>(store: &InMemoryDocumentStore, records: &[R]) {
        let offset = store.len(R::COLLECTION).unwrap();
        for (i, r) in records.iter().enumerate() {
            let mut doc = r.to_document().unwrap();
            doc.entry(KEY_FIELD)
                .or_insert_with(|| Value::String(format!("{:04}", offset + i)));
            store.save(R::COLLECTION, doc).unwrap();
        }
    }
}
