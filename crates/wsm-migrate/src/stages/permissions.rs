use wsm_store::Filter;
use wsm_types::{is_integer_literal, Collection, Permission, StoredRecord, UserDoc, PUBLIC_USER};

use crate::changelog::{Change, RemovalReason};
use crate::driver::MigrationPhase;
use crate::error::MigrationResult;
use crate::rules::LegacyRule;
use crate::stages::{MigrationStage, StageContext, StageStats};

/// Enforces the public workspace permission policy on user records.
///
/// The public user ends up with exactly one `r` entry per public workspace
/// it already referenced. Every other user loses its entries for public
/// workspaces and, under [`LegacyRule::IntegerPermissions`], its entries for
/// integer workspace ids.
pub struct NormalizePermissions;

impl MigrationStage for NormalizePermissions {
    fn name(&self) -> &str {
        "permissions"
    }

    fn phase(&self) -> MigrationPhase {
        MigrationPhase::UsersNormalized
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> MigrationResult<StageStats> {
        let mut stats = StageStats::default();
        normalize_public_user(ctx, &mut stats)?;
        normalize_other_users(ctx, &mut stats)?;
        Ok(stats)
    }
}

fn normalize_public_user(ctx: &mut StageContext<'_>, stats: &mut StageStats) -> MigrationResult<()> {
    let Some(doc) = ctx
        .store
        .find_one(Collection::Users, &Filter::eq("id", PUBLIC_USER))?
    else {
        ctx.log.record(Change::MissingPublicUser);
        return Ok(());
    };
    stats.scanned += 1;
    let mut user = UserDoc::from_document(doc)?;

    let mut stale = Vec::new();
    let mut downgraded = Vec::new();
    for (workspace, perm) in &user.workspaces {
        if !ctx.public_workspaces.contains(workspace) {
            stale.push(workspace.clone());
        } else if *perm != Permission::Read {
            downgraded.push((workspace.clone(), *perm));
        }
    }
    if stale.is_empty() && downgraded.is_empty() {
        return Ok(());
    }

    for workspace in &stale {
        user.workspaces.remove(workspace);
    }
    for (workspace, _) in &downgraded {
        user.workspaces.insert(workspace.clone(), Permission::Read);
    }
    if !stale.is_empty() {
        ctx.log.record(Change::PermissionsRemoved {
            user: user.id.clone(),
            reason: RemovalReason::StaleWorkspace,
            workspaces: stale,
        });
    }
    if !downgraded.is_empty() {
        ctx.log.record(Change::PermissionsDowngraded {
            user: user.id.clone(),
            workspaces: downgraded,
        });
    }
    stats.modified += 1;
    ctx.persist(&user)?;
    Ok(())
}

fn normalize_other_users(ctx: &mut StageContext<'_>, stats: &mut StageStats) -> MigrationResult<()> {
    let drop_integers = ctx.config.rules.is_active(LegacyRule::IntegerPermissions);
    let users = ctx.snapshot::<UserDoc>(&Filter::ne("id", PUBLIC_USER))?;
    for user in users {
        let mut user = user?;
        stats.scanned += 1;

        let mut public = Vec::new();
        let mut integer = Vec::new();
        for workspace in user.workspaces.keys() {
            if ctx.public_workspaces.contains(workspace) {
                public.push(workspace.clone());
            } else if drop_integers && is_integer_literal(workspace) {
                integer.push(workspace.clone());
            }
        }
        if public.is_empty() && integer.is_empty() {
            continue;
        }

        for workspace in public.iter().chain(&integer) {
            user.workspaces.remove(workspace);
        }
        if !public.is_empty() {
            ctx.log.record(Change::PermissionsRemoved {
                user: user.id.clone(),
                reason: RemovalReason::PublicWorkspace,
                workspaces: public,
            });
        }
        if !integer.is_empty() {
            ctx.log.record(Change::PermissionsRemoved {
                user: user.id.clone(),
                reason: RemovalReason::IntegerWorkspace,
                workspaces: integer,
            });
        }
        stats.modified += 1;
        ctx.persist(&user)?;
    }
    Ok(())
}
