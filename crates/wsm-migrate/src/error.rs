use std::fmt;

use wsm_store::StoreError;
use wsm_types::TypeError;

use crate::changelog::ChangeLog;
use crate::driver::MigrationPhase;

/// Errors that stop a migration run.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Two distinct type names sanitize to the same name.
    #[error("type names {first:?} and {second:?} both sanitize to {canonical:?}")]
    TypeNameCollision {
        first: String,
        second: String,
        canonical: String,
    },

    /// A workspace or object references a type the rename map does not know.
    #[error("type {type_name:?} referenced by {referenced_by} is not registered; the database is corrupted")]
    UnknownType {
        type_name: String,
        referenced_by: String,
    },

    /// The same workspace id came up twice in one scan.
    #[error("workspace {0:?} seen twice in one scan")]
    DuplicateWorkspace(String),

    /// A disambiguated object id collides with another id in its workspace.
    #[error("object id {id:?} in workspace {workspace:?} would be assigned twice")]
    FinalIdCollision { workspace: String, id: String },

    /// The store could not be reached or rejected the credentials.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store call failed mid-run.
    #[error("store error: {0}")]
    Store(StoreError),

    /// A document does not match the legacy schema.
    #[error("cannot decode document: {0}")]
    Decode(#[from] TypeError),

    /// A stage pipeline tried to move the run backwards.
    #[error("phase {to} cannot follow {from}")]
    PhaseOrder {
        from: MigrationPhase,
        to: MigrationPhase,
    },

    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MigrationError {
    /// Returns `true` for conditions that mean the stored data itself is
    /// inconsistent, as opposed to an environment or I/O failure.
    pub fn is_fatal_inconsistency(&self) -> bool {
        matches!(
            self,
            Self::TypeNameCollision { .. }
                | Self::UnknownType { .. }
                | Self::DuplicateWorkspace(_)
                | Self::FinalIdCollision { .. }
        )
    }
}

impl From<StoreError> for MigrationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(_)
            | StoreError::AuthenticationFailed(_)
            | StoreError::NotAuthenticated => Self::StoreUnavailable(e.to_string()),
            other => Self::Store(other),
        }
    }
}

/// Result alias for migration operations.
pub type MigrationResult<T> = Result<T, MigrationError>;

/// A run that stopped before reaching [`MigrationPhase::Done`].
///
/// Writes committed before the failure stay in place. `log` holds every
/// change recorded up to the failure so the partial run can be audited.
#[derive(Debug)]
pub struct MigrationAbort {
    pub phase: MigrationPhase,
    pub error: MigrationError,
    pub log: ChangeLog,
}

impl fmt::Display for MigrationAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "migration aborted after {}: {}", self.phase, self.error)
    }
}

impl std::error::Error for MigrationAbort {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_map_to_unavailable() {
        let e: MigrationError = StoreError::AuthenticationFailed("admin".into()).into();
        assert!(matches!(e, MigrationError::StoreUnavailable(_)));
        let e: MigrationError = StoreError::NotAuthenticated.into();
        assert!(matches!(e, MigrationError::StoreUnavailable(_)));
    }

    #[test]
    fn other_store_errors_stay_store_errors() {
        let e: MigrationError = StoreError::Serialization("bad".into()).into();
        assert!(matches!(e, MigrationError::Store(_)));
        assert!(!e.is_fatal_inconsistency());
    }

    #[test]
    fn collisions_are_fatal_inconsistencies() {
        let e = MigrationError::TypeNameCollision {
            first: "a.b".into(),
            second: "a_b".into(),
            canonical: "a_b".into(),
        };
        assert!(e.is_fatal_inconsistency());
        assert!(e.to_string().contains("a_b"));
    }

    #[test]
    fn abort_display_names_the_phase() {
        let abort = MigrationAbort {
            phase: MigrationPhase::TypesNormalized,
            error: MigrationError::DuplicateWorkspace("w".into()),
            log: ChangeLog::new(),
        };
        let text = abort.to_string();
        assert!(text.contains("types-normalized"));
        assert!(text.contains("\"w\""));
    }
}
