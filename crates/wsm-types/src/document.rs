use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::identity::RawId;
use crate::permission::Permission;

/// A raw JSON document as held by a store.
pub type Document = serde_json::Map<String, Value>;

/// Store-assigned primary key field present on every saved document.
pub const KEY_FIELD: &str = "_id";

/// Reserved user id that owns world-readable workspaces.
pub const PUBLIC_USER: &str = "public";

/// Legacy bucket for objects saved without a workspace.
pub const NO_WORKSPACE: &str = "NO_WORKSPACE";

/// Embedded workspace index: type name → escaped object id → version token.
pub type ObjectIndex = BTreeMap<String, BTreeMap<String, Value>>;

/// The collections of the workspace service database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Workspaces,
    WorkspaceObjects,
    Types,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Workspaces,
        Collection::WorkspaceObjects,
        Collection::Types,
    ];

    /// On-disk collection name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Users => "workspaceUsers",
            Self::Workspaces => "workspaces",
            Self::WorkspaceObjects => "workspaceObjects",
            Self::Types => "typeObjects",
        }
    }

    /// Look a collection up by its on-disk name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed view of a document in one of the service collections.
///
/// Conversions go through `serde_json`, and every record type keeps the
/// fields it does not model in a flattened `extra` map so that a rewrite
/// never drops data it did not understand.
pub trait StoredRecord: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    /// Decode a raw document.
    fn from_document(doc: Document) -> Result<Self, TypeError> {
        serde_json::from_value(Value::Object(doc)).map_err(|e| TypeError::Schema {
            collection: Self::COLLECTION.name().to_string(),
            reason: e.to_string(),
        })
    }

    /// Encode back into a raw document for a full replace.
    fn to_document(&self) -> Result<Document, TypeError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(TypeError::Serialization(format!(
                "expected an object, got {other}"
            ))),
            Err(e) => Err(TypeError::Serialization(e.to_string())),
        }
    }
}

/// A service user and its per-workspace permissions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserDoc {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub id: String,
    #[serde(default)]
    pub workspaces: BTreeMap<String, Permission>,
    #[serde(flatten)]
    pub extra: Document,
}

impl UserDoc {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            key: None,
            id: id.into(),
            workspaces: BTreeMap::new(),
            extra: Document::new(),
        }
    }

    pub fn with_permission(mut self, workspace: impl Into<String>, perm: Permission) -> Self {
        self.workspaces.insert(workspace.into(), perm);
        self
    }

    pub fn is_public(&self) -> bool {
        self.id == PUBLIC_USER
    }
}

impl StoredRecord for UserDoc {
    const COLLECTION: Collection = Collection::Users;
}

/// A workspace and its embedded object index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceDoc {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub id: RawId,
    pub owner: String,
    #[serde(rename = "defaultPermissions")]
    pub default_permission: Permission,
    #[serde(default)]
    pub objects: ObjectIndex,
    #[serde(flatten)]
    pub extra: Document,
}

impl WorkspaceDoc {
    pub fn new(id: impl Into<RawId>, owner: impl Into<String>, perm: Permission) -> Self {
        Self {
            key: None,
            id: id.into(),
            owner: owner.into(),
            default_permission: perm,
            objects: ObjectIndex::new(),
            extra: Document::new(),
        }
    }

    /// Add an entry to the embedded index. `id` is taken as stored (escaped).
    pub fn with_object(
        mut self,
        type_name: impl Into<String>,
        id: impl Into<String>,
        token: impl Into<Value>,
    ) -> Self {
        self.objects
            .entry(type_name.into())
            .or_default()
            .insert(id.into(), token.into());
        self
    }

    pub fn is_public(&self) -> bool {
        self.owner == PUBLIC_USER
    }
}

impl StoredRecord for WorkspaceDoc {
    const COLLECTION: Collection = Collection::Workspaces;
}

/// A type registry entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeDoc {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub id: String,
    #[serde(flatten)]
    pub extra: Document,
}

impl TypeDoc {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            key: None,
            id: id.into(),
            extra: Document::new(),
        }
    }
}

impl StoredRecord for TypeDoc {
    const COLLECTION: Collection = Collection::Types;
}

/// One stored version of a workspace object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectInstanceDoc {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub owner: String,
    pub workspace: RawId,
    pub id: RawId,
    #[serde(rename = "type")]
    pub type_name: String,
    pub instance: i64,
    pub uuid: String,
    #[serde(flatten)]
    pub extra: Document,
}

impl ObjectInstanceDoc {
    pub fn new(
        workspace: impl Into<RawId>,
        id: impl Into<RawId>,
        type_name: impl Into<String>,
        instance: i64,
        uuid: impl Into<String>,
    ) -> Self {
        Self {
            key: None,
            owner: String::new(),
            workspace: workspace.into(),
            id: id.into(),
            type_name: type_name.into(),
            instance,
            uuid: uuid.into(),
            extra: Document::new(),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Returns `true` for objects in the legacy workspace-less bucket.
    pub fn in_no_workspace(&self) -> bool {
        self.workspace.is_text(NO_WORKSPACE)
    }
}

impl StoredRecord for ObjectInstanceDoc {
    const COLLECTION: Collection = Collection::WorkspaceObjects;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn collection_names_roundtrip() {
        for c in Collection::ALL {
            assert_eq!(Collection::from_name(c.name()), Some(c));
        }
        assert_eq!(Collection::from_name("nope"), None);
    }

    #[test]
    fn workspace_decodes_legacy_layout() {
        let raw = doc(json!({
            "_id": "k1",
            "id": "abc.def",
            "owner": "alice",
            "defaultPermissions": "w",
            "objects": {"Ty#pe": {"x_DOT_y": "uuid-1"}},
            "description": "kept"
        }));
        let ws = WorkspaceDoc::from_document(raw).unwrap();
        assert_eq!(ws.key.as_deref(), Some("k1"));
        assert_eq!(ws.id, RawId::from("abc.def"));
        assert_eq!(ws.default_permission, Permission::Write);
        assert_eq!(ws.objects["Ty#pe"]["x_DOT_y"], json!("uuid-1"));
        assert_eq!(ws.extra["description"], json!("kept"));
    }

    #[test]
    fn unknown_fields_survive_a_rewrite() {
        let raw = doc(json!({
            "id": "bob",
            "workspaces": {"w1": "a"},
            "email": "bob@example.org"
        }));
        let user = UserDoc::from_document(raw).unwrap();
        let back = user.to_document().unwrap();
        assert_eq!(back["email"], json!("bob@example.org"));
        assert_eq!(back["workspaces"], json!({"w1": "a"}));
        assert!(!back.contains_key(KEY_FIELD));
    }

    #[test]
    fn integer_workspace_id_is_readable() {
        let raw = doc(json!({
            "id": 42,
            "owner": "alice",
            "defaultPermissions": "n"
        }));
        let ws = WorkspaceDoc::from_document(raw).unwrap();
        assert!(ws.id.is_integer());
        assert!(ws.objects.is_empty());
    }

    #[test]
    fn schema_mismatch_names_the_collection() {
        let raw = doc(json!({"id": "t", "instance": "not a number"}));
        let err = ObjectInstanceDoc::from_document(raw).unwrap_err();
        match err {
            TypeError::Schema { collection, .. } => assert_eq!(collection, "workspaceObjects"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn instance_type_field_is_renamed() {
        let obj = ObjectInstanceDoc::new("ws", "obj", "Genome", 3, "u-3").with_owner("alice");
        let raw = obj.to_document().unwrap();
        assert_eq!(raw["type"], json!("Genome"));
        assert_eq!(raw["instance"], json!(3));
        assert!(!obj.in_no_workspace());
        assert!(ObjectInstanceDoc::new(NO_WORKSPACE, "o", "T", 1, "u").in_no_workspace());
    }
}
