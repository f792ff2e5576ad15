use wsm_store::Filter;
use wsm_types::{Collection, ObjectInstanceDoc, RawId};

use crate::changelog::Change;
use crate::driver::MigrationPhase;
use crate::error::MigrationResult;
use crate::rules::LegacyRule;
use crate::stages::{MigrationStage, StageContext, StageStats};

/// Replays the type map and the rename ledger against every stored object
/// version.
///
/// Versions in the `NO_WORKSPACE` bucket take their uuid as their id. Those
/// fixes are written like any other but may be left out of the change log.
pub struct RewriteInstances;

impl MigrationStage for RewriteInstances {
    fn name(&self) -> &str {
        "instances"
    }

    fn phase(&self) -> MigrationPhase {
        MigrationPhase::InstancesNormalized
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> MigrationResult<StageStats> {
        let delete_integers = ctx.config.rules.is_active(LegacyRule::IntegerInstances);
        let suppress = ctx.config.suppress_no_workspace_id_change_output;

        let mut stats = StageStats::default();
        for obj in ctx.snapshot::<ObjectInstanceDoc>(&Filter::All)? {
            let mut obj = obj?;
            stats.scanned += 1;
            let workspace = obj.workspace.as_text().into_owned();
            let old_id = obj.id.as_text().into_owned();

            if delete_integers && (obj.workspace.is_integer() || obj.id.is_integer()) {
                let filter = Filter::eq("workspace", obj.workspace.to_value())
                    .and(Filter::eq("id", obj.id.to_value()))
                    .and(Filter::eq("instance", obj.instance));
                ctx.delete(Collection::WorkspaceObjects, &filter)?;
                ctx.log.record(Change::InstanceDeleted {
                    workspace,
                    id: old_id,
                    instance: obj.instance,
                });
                stats.deleted += 1;
                continue;
            }

            let old_type = obj.type_name.clone();
            let new_type = ctx
                .type_map
                .require(&old_type, || {
                    format!("object {workspace}/{old_id} version {}", obj.instance)
                })?
                .to_string();

            let mut new_id = ctx
                .ledger
                .lookup(&workspace, &old_id, &new_type)
                .map(|entry| entry.final_id.clone())
                .unwrap_or_else(|| old_id.clone());
            let no_workspace = obj.in_no_workspace();
            if no_workspace {
                new_id = obj.uuid.clone();
            }

            if new_type == old_type && new_id == old_id {
                continue;
            }
            if !(no_workspace && suppress) {
                ctx.log.record(Change::InstanceUpdated {
                    owner: obj.owner.clone(),
                    workspace,
                    old_id: old_id.clone(),
                    instance: obj.instance,
                    new_id: new_id.clone(),
                    old_type,
                    new_type: new_type.clone(),
                });
            }
            obj.type_name = new_type;
            if new_id != old_id {
                obj.id = RawId::Text(new_id);
            }
            stats.modified += 1;
            ctx.persist(&obj)?;
        }
        Ok(stats)
    }
}
