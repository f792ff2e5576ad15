use std::fmt;
use std::time::{Duration, Instant};

use wsm_store::{Credentials, DocumentStore};

use crate::changelog::ChangeLog;
use crate::config::MigrationConfig;
use crate::error::{MigrationAbort, MigrationError, MigrationResult};
use crate::stages::{
    LoadPublicSet, MigrationStage, NormalizePermissions, NormalizeTypes, RebuildWorkspaceIndexes,
    RewriteInstances, StageContext, StageStats,
};

// ---------------------------------------------------------------------------
// MigrationPhase
// ---------------------------------------------------------------------------

/// How far a run has progressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MigrationPhase {
    Init,
    PublicSetLoaded,
    UsersNormalized,
    TypesNormalized,
    WorkspacesNormalized,
    InstancesNormalized,
    Done,
    Aborted,
}

impl MigrationPhase {
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::PublicSetLoaded => "public-set-loaded",
            Self::UsersNormalized => "users-normalized",
            Self::TypesNormalized => "types-normalized",
            Self::WorkspacesNormalized => "workspaces-normalized",
            Self::InstancesNormalized => "instances-normalized",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    /// Returns `true` once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Enforces that a run only ever moves forward.
///
/// `Aborted` may follow any non-terminal phase; every other transition must
/// go to a later phase.
#[derive(Clone, Debug)]
pub struct PhaseTracker {
    current: MigrationPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: MigrationPhase::Init,
        }
    }

    pub fn current(&self) -> MigrationPhase {
        self.current
    }

    pub fn advance(&mut self, to: MigrationPhase) -> MigrationResult<()> {
        let from = self.current;
        if from.is_terminal() || to <= from {
            return Err(MigrationError::PhaseOrder { from, to });
        }
        tracing::debug!(%from, %to, "phase transition");
        self.current = to;
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// MigrationReport
// ---------------------------------------------------------------------------

/// Outcome of one stage.
#[derive(Clone, Debug)]
pub struct StageReport {
    pub name: String,
    pub stats: StageStats,
    pub elapsed: Duration,
}

/// Outcome of a completed run.
#[derive(Clone, Debug)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub phase: MigrationPhase,
    /// Per-stage results in pipeline order.
    pub stages: Vec<StageReport>,
    pub log: ChangeLog,
    /// Number of object renames recorded in the ledger.
    pub ledger_entries: usize,
    /// Number of type names that changed.
    pub type_renames: usize,
    pub elapsed: Duration,
}

impl MigrationReport {
    /// Counters summed over all stages.
    pub fn totals(&self) -> StageStats {
        let mut total = StageStats::default();
        for stage in &self.stages {
            total += stage.stats;
        }
        total
    }

    pub fn digest_hex(&self) -> String {
        self.log.digest_hex()
    }
}

// ---------------------------------------------------------------------------
// Migrator
// ---------------------------------------------------------------------------

/// Runs the migration stages in dependency order against a store.
///
/// The pipeline is fail-fast: the first stage error stops the run. Writes
/// made before the failure are not rolled back.
pub struct Migrator {
    stages: Vec<Box<dyn MigrationStage>>,
    config: MigrationConfig,
    credentials: Option<Credentials>,
}

impl Migrator {
    /// A migrator with the standard pipeline:
    /// public set -> permissions -> types -> workspaces -> instances
    pub fn new(config: MigrationConfig) -> Self {
        let mut migrator = Self::empty(config);
        migrator.add_stage(Box::new(LoadPublicSet));
        migrator.add_stage(Box::new(NormalizePermissions));
        migrator.add_stage(Box::new(NormalizeTypes));
        migrator.add_stage(Box::new(RebuildWorkspaceIndexes));
        migrator.add_stage(Box::new(RewriteInstances));
        migrator
    }

    /// A migrator with no stages. Use [`Self::add_stage`] to build a
    /// pipeline.
    pub fn empty(config: MigrationConfig) -> Self {
        Self {
            stages: Vec::new(),
            config,
            credentials: None,
        }
    }

    /// Append a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: Box<dyn MigrationStage>) {
        self.stages.push(stage);
    }

    /// Authenticate against the store before the first read.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, store: &dyn DocumentStore) -> Result<MigrationReport, MigrationAbort> {
        let started = Instant::now();
        let mut tracker = PhaseTracker::new();
        tracing::info!(
            dry_run = self.config.dry_run,
            rules = %self.config.rules,
            "starting migration"
        );

        if let Some(credentials) = &self.credentials {
            if let Err(e) = store.authenticate(credentials) {
                return Err(abort(&mut tracker, e.into(), ChangeLog::new()));
            }
        }

        let mut ctx = StageContext::new(store, &self.config);
        let mut stages = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let stage_started = Instant::now();
            let outcome = stage
                .run(&mut ctx)
                .and_then(|stats| tracker.advance(stage.phase()).map(|()| stats));
            let stats = match outcome {
                Ok(stats) => stats,
                Err(e) => {
                    let log = std::mem::take(&mut ctx.log);
                    return Err(abort(&mut tracker, e, log));
                }
            };
            tracing::info!(
                stage = stage.name(),
                scanned = stats.scanned,
                modified = stats.modified,
                deleted = stats.deleted,
                "stage complete"
            );
            stages.push(StageReport {
                name: stage.name().to_string(),
                stats,
                elapsed: stage_started.elapsed(),
            });
        }
        if let Err(e) = tracker.advance(MigrationPhase::Done) {
            return Err(abort(&mut tracker, e, ctx.log));
        }
        // The ledger is dropped with the run; -v keeps a trace of it.
        for (workspace, raw_id, type_name, entry) in ctx.ledger.iter() {
            tracing::debug!(workspace, raw_id, type_name, final_id = %entry.final_id, "ledger entry");
        }

        let report = MigrationReport {
            dry_run: self.config.dry_run,
            phase: tracker.current(),
            stages,
            ledger_entries: ctx.ledger.len(),
            type_renames: ctx.type_map.renames().count(),
            log: ctx.log,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            changes = report.log.len(),
            digest = %report.digest_hex(),
            "migration finished"
        );
        Ok(report)
    }
}

fn abort(tracker: &mut PhaseTracker, error: MigrationError, log: ChangeLog) -> MigrationAbort {
    let phase = tracker.current();
    tracing::error!(%phase, %error, "migration aborted");
    // Cannot fail unless the tracker is already terminal, which only a
    // completed run reaches.
    let _ = tracker.advance(MigrationPhase::Aborted);
    MigrationAbort { phase, error, log }
}
