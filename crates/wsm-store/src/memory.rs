use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use wsm_types::{Collection, Document, KEY_FIELD};

use crate::error::{StoreError, StoreResult};
use crate::filter::{Filter, Projection};
use crate::traits::{Credentials, DocumentCursor, DocumentStore};

type Collections = BTreeMap<Collection, BTreeMap<String, Document>>;

/// In-memory document store.
///
/// Collections are `BTreeMap`s keyed by primary key behind a single
/// `RwLock`, so scans come back in key order and repeated runs over the
/// same data see the same sequence. Intended for tests, embedding, and as
/// the working copy behind [`crate::JsonFileStore`].
pub struct InMemoryDocumentStore {
    collections: RwLock<Collections>,
    required: Option<Credentials>,
    authenticated: AtomicBool,
}

impl InMemoryDocumentStore {
    /// Create a new empty store that accepts unauthenticated access.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            required: None,
            authenticated: AtomicBool::new(false),
        }
    }

    /// Create a store that refuses access until `credentials` are presented.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            required: Some(credentials),
            ..Self::new()
        }
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: Collection) -> StoreResult<usize> {
        Ok(self
            .read()?
            .get(&collection)
            .map(BTreeMap::len)
            .unwrap_or(0))
    }

    /// Returns `true` if no collection holds any document.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read()?.values().all(BTreeMap::is_empty))
    }

    /// All documents of a collection in key order.
    pub fn documents(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        Ok(self
            .read()?
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Build a store from a dump of the form `{"collectionName": [doc, ...]}`.
    ///
    /// Documents without a primary key are keyed by their position so that
    /// loading the same dump twice yields the same scan order.
    pub fn from_dump(dump: Value) -> StoreResult<Self> {
        let Value::Object(root) = dump else {
            return Err(StoreError::Serialization(
                "dump must be a JSON object of collections".into(),
            ));
        };
        let store = Self::new();
        {
            let mut collections = store.write()?;
            for (name, docs) in root {
                let collection = Collection::from_name(&name).ok_or_else(|| {
                    StoreError::Serialization(format!("unknown collection {name:?}"))
                })?;
                let Value::Array(docs) = docs else {
                    return Err(StoreError::Serialization(format!(
                        "collection {name:?} must be an array"
                    )));
                };
                let target = collections.entry(collection).or_default();
                for (index, doc) in docs.into_iter().enumerate() {
                    let Value::Object(mut doc) = doc else {
                        return Err(StoreError::Serialization(format!(
                            "{name}[{index}] is not an object"
                        )));
                    };
                    let key = match doc.get(KEY_FIELD) {
                        Some(_) => document_key(collection, &doc)?,
                        None => {
                            let key = format!("{index:08}");
                            doc.insert(KEY_FIELD.into(), Value::String(key.clone()));
                            key
                        }
                    };
                    target.insert(key, doc);
                }
            }
        }
        Ok(store)
    }

    /// Export every collection in the layout accepted by [`Self::from_dump`].
    pub fn to_dump(&self) -> StoreResult<Value> {
        let collections = self.read()?;
        let mut root = serde_json::Map::new();
        for (collection, docs) in collections.iter() {
            let docs = docs.values().cloned().map(Value::Object).collect();
            root.insert(collection.name().to_string(), Value::Array(docs));
        }
        Ok(Value::Object(root))
    }

    fn check_access(&self) -> StoreResult<()> {
        if self.required.is_some() && !self.authenticated.load(Ordering::Acquire) {
            return Err(StoreError::NotAuthenticated);
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Next matching document with a key strictly after `after`.
    fn next_live(
        &self,
        collection: Collection,
        filter: &Filter,
        after: Option<&str>,
    ) -> StoreResult<Option<(String, Document)>> {
        let collections = self.read()?;
        let Some(docs) = collections.get(&collection) else {
            return Ok(None);
        };
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        Ok(docs
            .range::<str, _>((lower, Bound::Unbounded))
            .find(|(_, doc)| filter.matches(doc))
            .map(|(k, doc)| (k.clone(), doc.clone())))
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn document_key(collection: Collection, doc: &Document) -> StoreResult<String> {
    match doc.get(KEY_FIELD) {
        Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
        Some(other) => Err(StoreError::InvalidKey {
            collection,
            reason: format!("expected a non-empty string, got {other}"),
        }),
        None => Err(StoreError::InvalidKey {
            collection,
            reason: "missing".into(),
        }),
    }
}

fn project(doc: Document, projection: Option<&Projection>) -> Document {
    match projection {
        Some(p) => p.apply(&doc),
        None => doc,
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn authenticate(&self, credentials: &Credentials) -> StoreResult<()> {
        match &self.required {
            Some(required) if required != credentials => Err(StoreError::AuthenticationFailed(
                credentials.username.clone(),
            )),
            _ => {
                self.authenticated.store(true, Ordering::Release);
                Ok(())
            }
        }
    }

    fn scan_snapshot(
        &self,
        collection: Collection,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> StoreResult<DocumentCursor<'_>> {
        self.check_access()?;
        let collections = self.read()?;
        let docs = collections
            .get(&collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filter.matches(doc))
                    .map(|doc| project(doc.clone(), projection))
                    .collect()
            })
            .unwrap_or_default();
        Ok(DocumentCursor::from_vec(docs))
    }

    fn scan_live(
        &self,
        collection: Collection,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> StoreResult<DocumentCursor<'_>> {
        self.check_access()?;
        let filter = filter.clone();
        let projection = projection.cloned();
        let mut last: Option<String> = None;
        let mut done = false;
        Ok(DocumentCursor::new(std::iter::from_fn(move || {
            if done {
                return None;
            }
            match self.next_live(collection, &filter, last.as_deref()) {
                Ok(Some((key, doc))) => {
                    last = Some(key);
                    Some(Ok(project(doc, projection.as_ref())))
                }
                Ok(None) => {
                    done = true;
                    None
                }
                Err(e) => {
                    done = true;
                    Some(Err(e))
                }
            }
        })))
    }

    fn save(&self, collection: Collection, mut document: Document) -> StoreResult<String> {
        self.check_access()?;
        let key = if document.contains_key(KEY_FIELD) {
            document_key(collection, &document)?
        } else {
            let key = uuid::Uuid::new_v4().to_string();
            document.insert(KEY_FIELD.into(), Value::String(key.clone()));
            key
        };
        let mut collections = self.write()?;
        collections
            .entry(collection)
            .or_default()
            .insert(key.clone(), document);
        Ok(key)
    }

    fn remove(&self, collection: Collection, filter: &Filter) -> StoreResult<usize> {
        self.check_access()?;
        let mut collections = self.write()?;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|_, doc| !filter.matches(doc));
        Ok(before - docs.len())
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<&'static str, usize> = match self.collections.read() {
            Ok(c) => c.iter().map(|(k, v)| (k.name(), v.len())).collect(),
            Err(_) => BTreeMap::new(),
        };
        f.debug_struct("InMemoryDocumentStore")
            .field("collections", &counts)
            .field("requires_auth", &self.required.is_some())
            .finish()
    }
}
