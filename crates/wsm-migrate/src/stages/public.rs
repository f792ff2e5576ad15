use std::collections::BTreeSet;

use wsm_store::{Filter, Projection};
use wsm_types::{Collection, PUBLIC_USER};

use crate::changelog::Change;
use crate::driver::MigrationPhase;
use crate::error::MigrationResult;
use crate::rules::LegacyRule;
use crate::stages::{raw_id_field, MigrationStage, StageContext, StageStats};

/// Collects the ids of every workspace owned by the public user.
///
/// Read-only, so it uses a live scan. Public workspaces with integer ids
/// are flagged; they are deleted later by the workspace stage like any
/// other integer workspace.
pub struct LoadPublicSet;

impl MigrationStage for LoadPublicSet {
    fn name(&self) -> &str {
        "public-set"
    }

    fn phase(&self) -> MigrationPhase {
        MigrationPhase::PublicSetLoaded
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> MigrationResult<StageStats> {
        let store = ctx.store;
        let flag_integers = ctx.config.rules.is_active(LegacyRule::IntegerWorkspaces);
        let projection = Projection::fields(["id"]);
        let mut stats = StageStats::default();
        let mut public = BTreeSet::new();
        let mut integer_ids = Vec::new();

        let filter = Filter::eq("owner", PUBLIC_USER);
        for doc in store.scan_live(Collection::Workspaces, &filter, Some(&projection))? {
            let doc = doc?;
            stats.scanned += 1;
            let id = raw_id_field(&doc, Collection::Workspaces, "id")?;
            let text = id.as_text().into_owned();
            if flag_integers && id.is_integer() {
                integer_ids.push(text.clone());
            }
            public.insert(text);
        }

        integer_ids.sort();
        for workspace in integer_ids {
            ctx.log.record(Change::IntegerPublicWorkspace { workspace });
        }
        tracing::debug!(count = public.len(), "loaded public workspace set");
        ctx.public_workspaces = public;
        Ok(stats)
    }
}
