use std::collections::BTreeSet;

use wsm_store::{Filter, Projection};
use wsm_types::{Collection, TypeDoc};

use crate::changelog::Change;
use crate::driver::MigrationPhase;
use crate::error::MigrationResult;
use crate::ledger::TypeRenameMap;
use crate::stages::{text_field, MigrationStage, StageContext, StageStats};

/// Builds the type rename map and rewrites the type registry through it.
///
/// The map covers every name in the registry and every name used by a
/// stored object version, so later stages can resolve any type they meet.
pub struct NormalizeTypes;

impl MigrationStage for NormalizeTypes {
    fn name(&self) -> &str {
        "types"
    }

    fn phase(&self) -> MigrationPhase {
        MigrationPhase::TypesNormalized
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> MigrationResult<StageStats> {
        let names = collect_type_names(ctx)?;
        let map = TypeRenameMap::build(names)?;
        for (from, to) in map.renames() {
            ctx.log.record(Change::TypeRenamed {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        ctx.type_map = map;

        let mut stats = StageStats::default();
        for entry in ctx.snapshot::<TypeDoc>(&Filter::All)? {
            let mut entry = entry?;
            stats.scanned += 1;
            let canonical = ctx
                .type_map
                .require(&entry.id, || "the type registry".to_string())?;
            if canonical == entry.id {
                continue;
            }
            entry.id = canonical.to_string();
            stats.modified += 1;
            ctx.persist(&entry)?;
        }
        Ok(stats)
    }
}

/// Union of registered type names and the types of stored object versions.
fn collect_type_names(ctx: &StageContext<'_>) -> MigrationResult<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    let ids = Projection::fields(["id"]);
    for doc in ctx.store.scan_live(Collection::Types, &Filter::All, Some(&ids))? {
        names.insert(text_field(&doc?, Collection::Types, "id")?);
    }
    let types = Projection::fields(["type"]);
    for doc in ctx
        .store
        .scan_live(Collection::WorkspaceObjects, &Filter::All, Some(&types))?
    {
        names.insert(text_field(&doc?, Collection::WorkspaceObjects, "type")?);
    }
    tracing::debug!(count = names.len(), "collected type names");
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationConfig;
    use crate::error::MigrationError;
    use crate::stages::testing::seed;
    use wsm_store::InMemoryDocumentStore;
    use wsm_types::{ObjectInstanceDoc, StoredRecord};

    fn registry(store: &InMemoryDocumentStore) -> Vec<String> {
        store
            .documents(Collection::Types)
            .unwrap()
            .into_iter()
            .map(|d| TypeDoc::from_document(d).unwrap().id)
            .collect()
    }

    #[test]
    fn renames_registry_entries() {
        let store = InMemoryDocumentStore::new();
        seed(&store, &[TypeDoc::new("Ty#pe"), TypeDoc::new("Genome")]);
        seed(
            &store,
            &[ObjectInstanceDoc::new("ws", "o", "Only.In.Objects", 1, "u1")],
        );
        let config = MigrationConfig::commit();
        let mut ctx = StageContext::new(&store, &config);
        let stats = NormalizeTypes.run(&mut ctx).unwrap();

        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.modified, 1);
        assert_eq!(registry(&store), vec!["Ty_pe", "Genome"]);
        assert_eq!(ctx.type_map.len(), 3);
        assert_eq!(ctx.type_map.get("Only.In.Objects"), Some("Only_In_Objects"));
        assert_eq!(
            ctx.log.lines(),
            vec![
                "type Only.In.Objects -> Only_In_Objects",
                "type Ty#pe -> Ty_pe"
            ]
        );
    }

    #[test]
    fn colliding_names_abort_before_any_write() {
        let store = InMemoryDocumentStore::new();
        seed(&store, &[TypeDoc::new("a.b"), TypeDoc::new("a_b")]);
        let config = MigrationConfig::commit();
        let mut ctx = StageContext::new(&store, &config);
        let err = NormalizeTypes.run(&mut ctx).unwrap_err();
        assert!(matches!(err, MigrationError::TypeNameCollision { .. }));
        assert_eq!(registry(&store), vec!["a.b", "a_b"]);
    }

    #[test]
    fn dry_run_leaves_registry_alone() {
        let store = InMemoryDocumentStore::new();
        seed(&store, &[TypeDoc::new("Ty#pe")]);
        let config = MigrationConfig::default();
        let mut ctx = StageContext::new(&store, &config);
        let stats = NormalizeTypes.run(&mut ctx).unwrap();
        assert_eq!(stats.modified, 1);
        assert_eq!(registry(&store), vec!["Ty#pe"]);
        assert_eq!(ctx.type_map.get("Ty#pe"), Some("Ty_pe"));
    }
}
