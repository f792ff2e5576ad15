//! JSON dump backed store.
//!
//! [`JsonFileStore`] loads a database dump into an [`InMemoryDocumentStore`]
//! working copy and writes it back on [`JsonFileStore::flush`]. The write
//! goes to a temporary file in the same directory which is then renamed
//! over the original, so a crash never leaves a half-written dump.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;
use wsm_types::{Collection, Document};

use crate::error::{StoreError, StoreResult};
use crate::filter::{Filter, Projection};
use crate::memory::InMemoryDocumentStore;
use crate::traits::{Credentials, DocumentCursor, DocumentStore};

/// A document store persisted as a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: InMemoryDocumentStore,
    dirty: AtomicBool,
}

impl JsonFileStore {
    /// Open an existing dump. A missing or unreadable file is reported as
    /// [`StoreError::Unavailable`].
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = fs::read_to_string(&path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        let dump = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        let inner = InMemoryDocumentStore::from_dump(dump)?;
        debug!(path = %path.display(), "opened JSON store");
        Ok(Self {
            path,
            inner,
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if a write happened since the last flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Write the working copy back to disk if anything changed.
    pub fn flush(&self) -> StoreResult<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        let dump = self.inner.to_dump()?;
        let body = serde_json::to_vec_pretty(&dump)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        self.dirty.store(false, Ordering::Release);
        debug!(path = %self.path.display(), bytes = body.len(), "flushed JSON store");
        Ok(())
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

impl DocumentStore for JsonFileStore {
    fn authenticate(&self, credentials: &Credentials) -> StoreResult<()> {
        self.inner.authenticate(credentials)
    }

    fn scan_snapshot(
        &self,
        collection: Collection,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> StoreResult<DocumentCursor<'_>> {
        self.inner.scan_snapshot(collection, filter, projection)
    }

    fn scan_live(
        &self,
        collection: Collection,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> StoreResult<DocumentCursor<'_>> {
        self.inner.scan_live(collection, filter, projection)
    }

    fn save(&self, collection: Collection, document: Document) -> StoreResult<String> {
        let key = self.inner.save(collection, document)?;
        self.mark_dirty();
        Ok(key)
    }

    fn remove(&self, collection: Collection, filter: &Filter) -> StoreResult<usize> {
        let removed = self.inner.remove(collection, filter)?;
        if removed > 0 {
            self.mark_dirty();
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_dump(dir: &Path, value: serde_json::Value) -> PathBuf {
        let path = dir.join("db.json");
        fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        path
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonFileStore::open(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn garbage_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path).unwrap_err(),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn flush_persists_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dump(dir.path(), json!({"typeObjects": [{"id": "A"}]}));

        let store = JsonFileStore::open(&path).unwrap();
        assert!(!store.is_dirty());
        let mut doc = Document::new();
        doc.insert("id".into(), json!("B"));
        store.save(Collection::Types, doc).unwrap();
        assert!(store.is_dirty());
        store.flush().unwrap();
        assert!(!store.is_dirty());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.count(Collection::Types, &Filter::All).unwrap(), 2);
    }

    #[test]
    fn clean_store_does_not_rewrite_file() {
        let dir = tempfile::tempdir().unwrap();
        let original = json!({"typeObjects": [{"id": "A"}]});
        let path = write_dump(dir.path(), original.clone());
        let before = fs::read_to_string(&path).unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        store.remove(Collection::Types, &Filter::eq("id", "missing")).unwrap();
        store.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn keys_are_stable_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dump(
            dir.path(),
            json!({"workspaces": [{"id": "w", "owner": "o", "defaultPermissions": "n"}]}),
        );
        let first = JsonFileStore::open(&path).unwrap();
        let second = JsonFileStore::open(&path).unwrap();
        let a = first.find_one(Collection::Workspaces, &Filter::All).unwrap();
        let b = second.find_one(Collection::Workspaces, &Filter::All).unwrap();
        assert_eq!(a, b);
    }
}
