use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use wsm_store::Filter;
use wsm_types::{
    is_integer_literal, Collection, ObjectIndex, Permission, WorkspaceDoc, KEY_FIELD,
};

use crate::changelog::Change;
use crate::driver::MigrationPhase;
use crate::error::{MigrationError, MigrationResult};
use crate::rules::LegacyRule;
use crate::sanitize::{escape_object_id, needs_sanitizing, sanitize, unescape_object_id, CharClass};
use crate::stages::{MigrationStage, StageContext, StageStats};

/// Unescaped object id → canonical type → version token.
type ObjectTypes = BTreeMap<String, BTreeMap<String, Value>>;

/// Rebuilds every workspace's embedded object index.
///
/// Types are rewritten through the type map, ids are sanitized and made
/// unique within the workspace, and every id that changed is recorded in
/// the rename ledger for the instance stage. Workspaces are always
/// rewritten in a committed run, changed or not.
pub struct RebuildWorkspaceIndexes;

impl MigrationStage for RebuildWorkspaceIndexes {
    fn name(&self) -> &str {
        "workspaces"
    }

    fn phase(&self) -> MigrationPhase {
        MigrationPhase::WorkspacesNormalized
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> MigrationResult<StageStats> {
        let rules = &ctx.config.rules;
        let delete_integers = rules.is_active(LegacyRule::IntegerWorkspaces);
        let drop_integer_ids = rules.is_active(LegacyRule::IntegerObjectIds);

        let mut stats = StageStats::default();
        let mut seen = BTreeSet::new();
        for ws in ctx.snapshot::<WorkspaceDoc>(&Filter::All)? {
            let mut ws = ws?;
            stats.scanned += 1;
            let id = ws.id.as_text().into_owned();

            if delete_integers && ws.id.is_integer() {
                let filter = match &ws.key {
                    Some(key) => Filter::eq(KEY_FIELD, key.as_str()),
                    None => Filter::eq("id", ws.id.to_value()),
                };
                ctx.delete(Collection::Workspaces, &filter)?;
                ctx.log.record(Change::WorkspaceDeleted { workspace: id });
                stats.deleted += 1;
                continue;
            }
            if !seen.insert(id.clone()) {
                return Err(MigrationError::DuplicateWorkspace(id));
            }
            tracing::debug!(workspace = %id, owner = %ws.owner, "rebuilding workspace index");

            let permission = default_permission(ws.default_permission, ctx.public_workspaces.contains(&id));
            let permission_changed = permission != ws.default_permission;
            if permission_changed {
                ctx.log.record(Change::DefaultPermissionChanged {
                    owner: ws.owner.clone(),
                    workspace: id.clone(),
                    from: ws.default_permission,
                    to: permission,
                });
                ws.default_permission = permission;
            }

            let objects = collect_objects(ctx, &ws, &id, drop_integer_ids)?;
            let index = rebuild_index(ctx, &ws.owner, &id, objects)?;
            if permission_changed || index != ws.objects {
                stats.modified += 1;
            }
            ws.objects = index;
            ctx.persist(&ws)?;
        }
        Ok(stats)
    }
}

/// Public workspaces are read-only; any other readable workspace is
/// downgraded to read-only and `n` stays as it is.
fn default_permission(current: Permission, is_public: bool) -> Permission {
    if is_public || current.is_readable() {
        Permission::Read
    } else {
        current
    }
}

/// Resolve index types and unescape ids, dropping integer ids.
fn collect_objects(
    ctx: &mut StageContext<'_>,
    ws: &WorkspaceDoc,
    workspace: &str,
    drop_integer_ids: bool,
) -> MigrationResult<ObjectTypes> {
    let mut objects = ObjectTypes::new();
    for (type_name, entries) in &ws.objects {
        let canonical = ctx
            .type_map
            .require(type_name, || format!("workspace {}/{workspace}", ws.owner))?
            .to_string();
        for (escaped, token) in entries {
            if drop_integer_ids && is_integer_literal(escaped) {
                ctx.log.record(Change::IndexEntryDropped {
                    workspace: workspace.to_string(),
                    type_name: type_name.clone(),
                    id: escaped.clone(),
                });
                continue;
            }
            let id = unescape_object_id(escaped).into_owned();
            let types = objects.entry(id.clone()).or_default();
            if types.insert(canonical.clone(), token.clone()).is_some() {
                return Err(MigrationError::FinalIdCollision {
                    workspace: workspace.to_string(),
                    id,
                });
            }
        }
    }
    Ok(objects)
}

/// Sanitize and disambiguate ids, fill the ledger, and return the new
/// index.
fn rebuild_index(
    ctx: &mut StageContext<'_>,
    owner: &str,
    workspace: &str,
    objects: ObjectTypes,
) -> MigrationResult<ObjectIndex> {
    // Ids that are already canonical keep their names and win any clash.
    let mut reserved: BTreeSet<String> = objects
        .keys()
        .filter(|id| !needs_sanitizing(id, CharClass::ObjectId))
        .cloned()
        .collect();
    let mut index = ObjectIndex::new();

    // Split names are claimed before any single-type id picks a suffix.
    for (id, types) in objects.iter().filter(|(_, types)| types.len() > 1) {
        let base = sanitize(id, CharClass::ObjectId);
        let mut split = Vec::with_capacity(types.len());
        for (type_name, token) in types {
            let final_id = claim(&mut reserved, format!("{base}_{type_name}"));
            ctx.ledger
                .record(workspace, id, type_name, final_id.clone(), token.clone());
            split.push((type_name.clone(), final_id.clone()));
            insert_entry(&mut index, type_name.clone(), &final_id, token.clone());
        }
        ctx.log.record(Change::DuplicateIdSplit {
            owner: owner.to_string(),
            workspace: workspace.to_string(),
            id: id.clone(),
            renamed: split,
        });
    }

    for (id, types) in objects {
        if types.len() != 1 {
            continue;
        }
        for (type_name, token) in types {
            let final_id = if needs_sanitizing(&id, CharClass::ObjectId) {
                let fixed = claim(&mut reserved, sanitize(&id, CharClass::ObjectId));
                ctx.log.record(Change::ObjectIdRenamed {
                    owner: owner.to_string(),
                    workspace: workspace.to_string(),
                    from: id.clone(),
                    to: fixed.clone(),
                });
                ctx.ledger
                    .record(workspace, &id, &type_name, fixed.clone(), token.clone());
                fixed
            } else {
                id.clone()
            };
            insert_entry(&mut index, type_name, &final_id, token);
        }
    }
    Ok(index)
}

/// Take `base` if no other id holds it, else the first free `base_N`.
fn claim(reserved: &mut BTreeSet<String>, base: String) -> String {
    let fixed = if reserved.contains(&base) {
        let mut n = 1;
        while reserved.contains(&format!("{base}_{n}")) {
            n += 1;
        }
        format!("{base}_{n}")
    } else {
        base
    };
    reserved.insert(fixed.clone());
    fixed
}

fn insert_entry(index: &mut ObjectIndex, type_name: String, id: &str, token: Value) {
    index
        .entry(type_name)
        .or_default()
        .insert(escape_object_id(id).into_owned(), token);
}
