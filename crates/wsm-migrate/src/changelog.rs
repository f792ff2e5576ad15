use std::fmt;

use wsm_types::Permission;

// ---------------------------------------------------------------------------
// Change
// ---------------------------------------------------------------------------

/// Why permission entries were taken away from a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalReason {
    /// The workspace is public; only `public` may hold a permission on it.
    PublicWorkspace,
    /// The workspace id is a legacy integer.
    IntegerWorkspace,
    /// The `public` user referenced a workspace that is no longer public.
    StaleWorkspace,
}

impl RemovalReason {
    fn label(self) -> &'static str {
        match self {
            Self::PublicWorkspace => "public workspaces",
            Self::IntegerWorkspace => "integer workspace ids",
            Self::StaleWorkspace => "workspaces no longer public",
        }
    }
}

/// Broad class of a change, used for log levels and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Rename,
    Update,
    Delete,
    Notice,
}

/// One entry in the change log.
///
/// The `Display` form of each variant is the line written to the audit log;
/// it must not depend on anything but the variant's own fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    IntegerPublicWorkspace {
        workspace: String,
    },
    MissingPublicUser,
    PermissionsRemoved {
        user: String,
        reason: RemovalReason,
        workspaces: Vec<String>,
    },
    PermissionsDowngraded {
        user: String,
        workspaces: Vec<(String, Permission)>,
    },
    TypeRenamed {
        from: String,
        to: String,
    },
    WorkspaceDeleted {
        workspace: String,
    },
    DefaultPermissionChanged {
        owner: String,
        workspace: String,
        from: Permission,
        to: Permission,
    },
    IndexEntryDropped {
        workspace: String,
        type_name: String,
        id: String,
    },
    ObjectIdRenamed {
        owner: String,
        workspace: String,
        from: String,
        to: String,
    },
    DuplicateIdSplit {
        owner: String,
        workspace: String,
        id: String,
        renamed: Vec<(String, String)>,
    },
    InstanceDeleted {
        workspace: String,
        id: String,
        instance: i64,
    },
    InstanceUpdated {
        owner: String,
        workspace: String,
        old_id: String,
        instance: i64,
        new_id: String,
        old_type: String,
        new_type: String,
    },
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::TypeRenamed { .. } | Self::ObjectIdRenamed { .. } | Self::DuplicateIdSplit { .. } => {
                ChangeKind::Rename
            }
            Self::PermissionsRemoved { .. }
            | Self::PermissionsDowngraded { .. }
            | Self::DefaultPermissionChanged { .. }
            | Self::InstanceUpdated { .. } => ChangeKind::Update,
            Self::WorkspaceDeleted { .. }
            | Self::IndexEntryDropped { .. }
            | Self::InstanceDeleted { .. } => ChangeKind::Delete,
            Self::IntegerPublicWorkspace { .. } | Self::MissingPublicUser => ChangeKind::Notice,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntegerPublicWorkspace { workspace } => write!(
                f,
                "notice: public workspace {workspace} has an integer id and will be deleted"
            ),
            Self::MissingPublicUser => {
                f.write_str("notice: no public user record; public permissions left untouched")
            }
            Self::PermissionsRemoved {
                user,
                reason,
                workspaces,
            } => write!(
                f,
                "user {user}: removed permissions to {}: {}",
                reason.label(),
                workspaces.join(" ")
            ),
            Self::PermissionsDowngraded { user, workspaces } => {
                let listed: Vec<_> = workspaces
                    .iter()
                    .map(|(ws, old)| format!("{ws}({old}->r)"))
                    .collect();
                write!(f, "user {user}: set read-only on {}", listed.join(" "))
            }
            Self::TypeRenamed { from, to } => write!(f, "type {from} -> {to}"),
            Self::WorkspaceDeleted { workspace } => {
                write!(f, "workspace {workspace}: deleted (integer id)")
            }
            Self::DefaultPermissionChanged {
                owner,
                workspace,
                from,
                to,
            } => write!(
                f,
                "workspace {owner}/{workspace}: default permission {from} -> {to}"
            ),
            Self::IndexEntryDropped {
                workspace,
                type_name,
                id,
            } => write!(
                f,
                "workspace {workspace}: dropped index entry {type_name}/{id} (integer id)"
            ),
            Self::ObjectIdRenamed {
                owner,
                workspace,
                from,
                to,
            } => write!(f, "workspace {owner}/{workspace}: object {from} -> {to}"),
            Self::DuplicateIdSplit {
                owner,
                workspace,
                id,
                renamed,
            } => {
                let listed: Vec<_> = renamed
                    .iter()
                    .map(|(t, new_id)| format!("{t}:{new_id}"))
                    .collect();
                write!(
                    f,
                    "workspace {owner}/{workspace}: object {id} split by type: {}",
                    listed.join(" ")
                )
            }
            Self::InstanceDeleted {
                workspace,
                id,
                instance,
            } => write!(
                f,
                "object {workspace}/{id} version {instance}: deleted (integer id)"
            ),
            Self::InstanceUpdated {
                owner,
                workspace,
                old_id,
                instance,
                new_id,
                old_type,
                new_type,
            } => write!(
                f,
                "object {owner}/{workspace}/{old_id} version {instance}: {old_id} {old_type} -> {new_id} {new_type}"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeLog
// ---------------------------------------------------------------------------

/// Ordered record of everything a run changed or would change.
///
/// The log is identical for dry and committed runs over the same data, so
/// its digest can be used to confirm that a commit did what a dry run
/// previewed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeLog {
    entries: Vec<Change>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change and emit it as a tracing event.
    pub fn record(&mut self, change: Change) {
        match change.kind() {
            ChangeKind::Delete | ChangeKind::Notice => tracing::warn!("{change}"),
            ChangeKind::Rename | ChangeKind::Update => tracing::info!("{change}"),
        }
        self.entries.push(change);
    }

    pub fn entries(&self) -> &[Change] {
        &self.entries
    }

    /// Rendered log lines in recording order.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries of the given kind.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.entries.iter().filter(|c| c.kind() == kind).count()
    }

    /// BLAKE3 digest of the rendered log, newline-terminated per line.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        for line in self.lines() {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        *hasher.finalize().as_bytes()
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_follow_recording_order() {
        let mut log = ChangeLog::new();
        log.record(Change::TypeRenamed {
            from: "Ty#pe".into(),
            to: "Ty_pe".into(),
        });
        log.record(Change::WorkspaceDeleted {
            workspace: "42".into(),
        });
        assert_eq!(
            log.lines(),
            vec!["type Ty#pe -> Ty_pe", "workspace 42: deleted (integer id)"]
        );
        assert_eq!(log.count(ChangeKind::Rename), 1);
        assert_eq!(log.count(ChangeKind::Delete), 1);
    }

    #[test]
    fn permission_lines_list_workspaces() {
        let removed = Change::PermissionsRemoved {
            user: "alice".into(),
            reason: RemovalReason::PublicWorkspace,
            workspaces: vec!["pub1".into(), "pub2".into()],
        };
        assert_eq!(
            removed.to_string(),
            "user alice: removed permissions to public workspaces: pub1 pub2"
        );
        let downgraded = Change::PermissionsDowngraded {
            user: "public".into(),
            workspaces: vec![("pub1".into(), Permission::Write)],
        };
        assert_eq!(downgraded.to_string(), "user public: set read-only on pub1(w->r)");
    }

    #[test]
    fn digest_depends_on_content_and_order() {
        let a = Change::TypeRenamed {
            from: "a".into(),
            to: "b".into(),
        };
        let c = Change::MissingPublicUser;

        let mut first = ChangeLog::new();
        first.record(a.clone());
        first.record(c.clone());
        let mut same = ChangeLog::new();
        same.record(a.clone());
        same.record(c.clone());
        let mut swapped = ChangeLog::new();
        swapped.record(c);
        swapped.record(a);

        assert_eq!(first.digest_hex(), same.digest_hex());
        assert_ne!(first.digest_hex(), swapped.digest_hex());
        assert_eq!(first.digest_hex().len(), 64);
    }

    #[test]
    fn empty_log_digest_is_hash_of_nothing() {
        let log = ChangeLog::new();
        assert!(log.is_empty());
        assert_eq!(log.digest(), *blake3::hash(b"").as_bytes());
    }

    #[test]
    fn notices_are_classified() {
        assert_eq!(Change::MissingPublicUser.kind(), ChangeKind::Notice);
        let updated = Change::InstanceUpdated {
            owner: "o".into(),
            workspace: "w".into(),
            old_id: "x#y".into(),
            instance: 3,
            new_id: "x_y_1".into(),
            old_type: "Ty#pe".into(),
            new_type: "Ty_pe".into(),
        };
        assert_eq!(updated.kind(), ChangeKind::Update);
        assert_eq!(
            updated.to_string(),
            "object o/w/x#y version 3: x#y Ty#pe -> x_y_1 Ty_pe"
        );
    }
}
