use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use wsm_store::{DocumentStore, Filter};
use wsm_types::{
    is_integer_literal, Collection, Document, ObjectInstanceDoc, Permission, StoredRecord,
    TypeDoc, UserDoc, WorkspaceDoc, PUBLIC_USER,
};

use crate::error::MigrationResult;
use crate::sanitize::{needs_sanitizing, unescape_object_id, CharClass};

/// Result of checking a store against the post-migration invariants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub documents_checked: usize,
    pub violations: Vec<Violation>,
}

impl VerificationReport {
    /// Returns `true` if no invariant is violated.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }
}

/// A single broken invariant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub collection: Collection,
    pub kind: ViolationKind,
    pub description: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:?}: {}", self.collection, self.kind, self.description)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    NonCanonicalType,
    UnregisteredType,
    NonCanonicalObjectId,
    DuplicateObjectId,
    IntegerIdentifier,
    PublicNotReadOnly,
    WritableDefault,
    PublicPermissionGranted,
    MissingIndexEntry,
    NoWorkspaceIdMismatch,
}

/// `(workspace, object id, type)` triples present in workspace indexes.
type IndexEntries = BTreeSet<(String, String, String)>;

struct Verifier {
    report: VerificationReport,
}

impl Verifier {
    fn flag(&mut self, collection: Collection, kind: ViolationKind, description: String) {
        self.report.violations.push(Violation {
            collection,
            kind,
            description,
        });
    }

    fn records<R: StoredRecord>(
        &mut self,
        store: &dyn DocumentStore,
        filter: &Filter,
    ) -> MigrationResult<Vec<R>> {
        let mut out = Vec::new();
        for doc in store.scan_snapshot(R::COLLECTION, filter, None)? {
            let doc: Document = doc?;
            out.push(R::from_document(doc)?);
            self.report.documents_checked += 1;
        }
        Ok(out)
    }

    fn check_types(&mut self, types: &[TypeDoc]) -> BTreeSet<String> {
        let mut registered = BTreeSet::new();
        for t in types {
            if needs_sanitizing(&t.id, CharClass::TypeName) {
                self.flag(
                    Collection::Types,
                    ViolationKind::NonCanonicalType,
                    format!("registered type {:?} is not canonical", t.id),
                );
            }
            registered.insert(t.id.clone());
        }
        registered
    }

    fn check_users(&mut self, users: &[UserDoc], public: &BTreeSet<String>) {
        for user in users {
            for (workspace, perm) in &user.workspaces {
                if is_integer_literal(workspace) {
                    self.flag(
                        Collection::Users,
                        ViolationKind::IntegerIdentifier,
                        format!("user {} has a permission on integer workspace {workspace}", user.id),
                    );
                }
                if user.is_public() {
                    if *perm != Permission::Read {
                        self.flag(
                            Collection::Users,
                            ViolationKind::PublicNotReadOnly,
                            format!("public user holds {perm} on {workspace}"),
                        );
                    }
                } else if public.contains(workspace) {
                    self.flag(
                        Collection::Users,
                        ViolationKind::PublicPermissionGranted,
                        format!("user {} holds {perm} on public workspace {workspace}", user.id),
                    );
                }
            }
        }
    }

    fn check_workspaces(
        &mut self,
        workspaces: &[WorkspaceDoc],
        registered: &BTreeSet<String>,
    ) -> IndexEntries {
        let mut entries = IndexEntries::new();
        for ws in workspaces {
            let id = ws.id.as_text();
            if ws.id.is_integer() {
                self.flag(
                    Collection::Workspaces,
                    ViolationKind::IntegerIdentifier,
                    format!("workspace id {id} is an integer"),
                );
            }
            match ws.default_permission {
                Permission::Read => {}
                Permission::None if !ws.is_public() => {}
                perm if ws.is_public() => self.flag(
                    Collection::Workspaces,
                    ViolationKind::PublicNotReadOnly,
                    format!("public workspace {id} has default permission {perm}"),
                ),
                perm => self.flag(
                    Collection::Workspaces,
                    ViolationKind::WritableDefault,
                    format!("workspace {}/{id} has default permission {perm}", ws.owner),
                ),
            }

            let mut types_by_id: BTreeMap<String, Vec<&str>> = BTreeMap::new();
            for (type_name, objects) in &ws.objects {
                if needs_sanitizing(type_name, CharClass::TypeName) {
                    self.flag(
                        Collection::Workspaces,
                        ViolationKind::NonCanonicalType,
                        format!("workspace {id} indexes non-canonical type {type_name:?}"),
                    );
                } else if !registered.contains(type_name) {
                    self.flag(
                        Collection::Workspaces,
                        ViolationKind::UnregisteredType,
                        format!("workspace {id} indexes unregistered type {type_name}"),
                    );
                }
                for escaped in objects.keys() {
                    let object_id = unescape_object_id(escaped).into_owned();
                    if is_integer_literal(&object_id) {
                        self.flag(
                            Collection::Workspaces,
                            ViolationKind::IntegerIdentifier,
                            format!("workspace {id} indexes integer object id {object_id}"),
                        );
                    } else if needs_sanitizing(&object_id, CharClass::ObjectId) {
                        self.flag(
                            Collection::Workspaces,
                            ViolationKind::NonCanonicalObjectId,
                            format!("workspace {id} indexes non-canonical object id {object_id:?}"),
                        );
                    }
                    types_by_id
                        .entry(object_id.clone())
                        .or_default()
                        .push(type_name);
                    entries.insert((id.to_string(), object_id, type_name.clone()));
                }
            }
            for (object_id, types) in types_by_id {
                if types.len() > 1 {
                    self.flag(
                        Collection::Workspaces,
                        ViolationKind::DuplicateObjectId,
                        format!(
                            "workspace {id} uses object id {object_id} for types {}",
                            types.join(", ")
                        ),
                    );
                }
            }
        }
        entries
    }

    fn check_instances(&mut self, instances: &[ObjectInstanceDoc], index: &IndexEntries) {
        for obj in instances {
            let workspace = obj.workspace.as_text();
            let id = obj.id.as_text();
            let name = format!("{workspace}/{id} version {}", obj.instance);
            if obj.workspace.is_integer() || obj.id.is_integer() {
                self.flag(
                    Collection::WorkspaceObjects,
                    ViolationKind::IntegerIdentifier,
                    format!("object {name} has an integer identifier"),
                );
                continue;
            }
            if needs_sanitizing(&obj.type_name, CharClass::TypeName) {
                self.flag(
                    Collection::WorkspaceObjects,
                    ViolationKind::NonCanonicalType,
                    format!("object {name} has non-canonical type {:?}", obj.type_name),
                );
            }
            if obj.in_no_workspace() {
                if *id != obj.uuid {
                    self.flag(
                        Collection::WorkspaceObjects,
                        ViolationKind::NoWorkspaceIdMismatch,
                        format!("object {name} has id {id} but uuid {}", obj.uuid),
                    );
                }
                continue;
            }
            let key = (workspace.to_string(), id.to_string(), obj.type_name.clone());
            if !index.contains(&key) {
                self.flag(
                    Collection::WorkspaceObjects,
                    ViolationKind::MissingIndexEntry,
                    format!("object {name} of type {} is not in its workspace index", obj.type_name),
                );
            }
        }
    }
}

/// Check a store against the invariants a completed migration establishes.
///
/// Read-only. Store and decode failures are returned as errors; broken
/// invariants are collected in the report.
pub fn verify_store(store: &dyn DocumentStore) -> MigrationResult<VerificationReport> {
    let mut v = Verifier {
        report: VerificationReport::default(),
    };

    let types: Vec<TypeDoc> = v.records(store, &Filter::All)?;
    let registered = v.check_types(&types);

    let workspaces: Vec<WorkspaceDoc> = v.records(store, &Filter::All)?;
    let public: BTreeSet<String> = workspaces
        .iter()
        .filter(|ws| ws.owner == PUBLIC_USER)
        .map(|ws| ws.id.as_text().into_owned())
        .collect();

    let users: Vec<UserDoc> = v.records(store, &Filter::All)?;
    v.check_users(&users, &public);
    let index = v.check_workspaces(&workspaces, &registered);

    let instances: Vec<ObjectInstanceDoc> = v.records(store, &Filter::All)?;
    v.check_instances(&instances, &index);

    tracing::debug!(
        documents = v.report.documents_checked,
        violations = v.report.violations.len(),
        "verification finished"
    );
    Ok(v.report)
}
