//! Document store adapter for the workspace service database.
//!
//! The migration engine never talks to a database driver directly. It sees
//! the store through the [`DocumentStore`] trait: point lookup, filtered
//! scans, full-document replace, and delete.
//!
//! # Scans
//!
//! Two scan modes exist and the difference matters:
//!
//! - [`DocumentStore::scan_snapshot`] -- a fixed view taken when the scan
//!   starts. Required for every pass that rewrites the collection it reads.
//! - [`DocumentStore::scan_live`] -- reads as it goes and may observe writes
//!   made during the scan. Only for read-only passes.
//!
//! # Storage Backends
//!
//! - [`InMemoryDocumentStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`JsonFileStore`] -- a JSON dump on disk, flushed atomically

pub mod error;
pub mod file;
pub mod filter;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::JsonFileStore;
pub use filter::{Filter, Projection};
pub use memory::InMemoryDocumentStore;
pub use traits::{Credentials, DocumentCursor, DocumentStore};
