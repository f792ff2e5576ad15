use std::fmt;

use wsm_types::{Collection, Document};

use crate::error::StoreResult;
use crate::filter::{Filter, Projection};

/// Username/password pair presented to a store's permission layer.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A lazy sequence of documents produced by a scan.
pub struct DocumentCursor<'a> {
    inner: Box<dyn Iterator<Item = StoreResult<Document>> + 'a>,
}

impl<'a> DocumentCursor<'a> {
    pub fn new(inner: impl Iterator<Item = StoreResult<Document>> + 'a) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    /// A cursor over documents already materialized in memory.
    pub fn from_vec(docs: Vec<Document>) -> Self {
        Self::new(docs.into_iter().map(Ok))
    }
}

impl Iterator for DocumentCursor<'_> {
    type Item = StoreResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Collection-agnostic document store.
///
/// All implementations must satisfy these invariants:
/// - Every saved document carries a string primary key in `_id`. `save`
///   assigns one when the document has none and replaces the whole
///   document when the key already exists.
/// - `scan_snapshot` observes the collection as it was when the scan
///   started. Documents saved or removed while the cursor is alive are
///   neither re-observed nor skipped. Any pass that writes to the
///   collection it is scanning must use it.
/// - `scan_live` reads as it goes and may observe writes made during the
///   scan. It is only safe for read-only passes.
/// - Scans yield documents in primary-key order.
pub trait DocumentStore: Send + Sync {
    /// Present credentials. Called at most once, before any other call.
    fn authenticate(&self, credentials: &Credentials) -> StoreResult<()>;

    /// Scan a fixed view of the matching documents.
    fn scan_snapshot(
        &self,
        collection: Collection,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> StoreResult<DocumentCursor<'_>>;

    /// Scan the matching documents without isolation from concurrent writes.
    fn scan_live(
        &self,
        collection: Collection,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> StoreResult<DocumentCursor<'_>>;

    /// Full-document upsert by primary key. Returns the key.
    fn save(&self, collection: Collection, document: Document) -> StoreResult<String>;

    /// Delete every matching document. Returns how many were removed.
    fn remove(&self, collection: Collection, filter: &Filter) -> StoreResult<usize>;

    /// First matching document, if any.
    fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>> {
        self.scan_live(collection, filter, None)?.next().transpose()
    }

    /// Number of matching documents.
    fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<usize> {
        let mut n = 0;
        for doc in self.scan_snapshot(collection, filter, None)? {
            doc?;
            n += 1;
        }
        Ok(n)
    }
}
