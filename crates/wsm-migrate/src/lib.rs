//! Schema migration engine for the workspace service database.
//!
//! A run upgrades the four service collections in one pass each while
//! keeping their cross references intact. Type names and object ids are
//! canonicalized, the public workspace permission policy is enforced, and
//! legacy corruption (integer identifiers) is removed. Every change is
//! recorded in a [`ChangeLog`], and a dry run produces the same log as the
//! commit it previews.
//!
//! # Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use wsm_migrate::{MigrationConfig, MigrationPhase, Migrator};
//! use wsm_store::InMemoryDocumentStore;
//!
//! let store = InMemoryDocumentStore::from_dump(json!({
//!     "typeObjects": [{"id": "Ty#pe"}],
//!     "workspaceUsers": [{"id": "public", "workspaces": {}}],
//! }))
//! .unwrap();
//! let report = Migrator::new(MigrationConfig::default()).run(&store).unwrap();
//! assert_eq!(report.phase, MigrationPhase::Done);
//! assert_eq!(report.log.lines(), vec!["type Ty#pe -> Ty_pe"]);
//! ```

pub mod changelog;
pub mod config;
pub mod driver;
pub mod error;
pub mod ledger;
pub mod rules;
pub mod sanitize;
pub mod stages;
pub mod verify;

pub use changelog::{Change, ChangeKind, ChangeLog, RemovalReason};
pub use config::MigrationConfig;
pub use driver::{MigrationPhase, MigrationReport, Migrator, PhaseTracker, StageReport};
pub use error::{MigrationAbort, MigrationError, MigrationResult};
pub use ledger::{LedgerEntry, RenameLedger, TypeRenameMap};
pub use rules::{LegacyRule, RuleSet};
pub use sanitize::{sanitize, CharClass};
pub use stages::{MigrationStage, StageContext, StageStats};
pub use verify::{verify_store, VerificationReport, Violation, ViolationKind};
