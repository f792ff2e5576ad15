//! Foundation types for the workspace-store migration tooling.
//!
//! This crate describes the legacy on-disk schema of the workspace service:
//! the four collections it keeps and the documents stored in them. Every
//! other `wsm-*` crate depends on `wsm-types`.
//!
//! # Key Types
//!
//! - [`Document`] - A raw JSON document as the store hands it out
//! - [`RawId`] - An identifier that may be a string or a legacy integer
//! - [`Permission`] - Workspace permission level (`n`, `r`, `w`, `a`)
//! - [`UserDoc`], [`WorkspaceDoc`], [`TypeDoc`], [`ObjectInstanceDoc`] - Typed
//!   views of the four collections that preserve unknown fields

pub mod document;
pub mod error;
pub mod identity;
pub mod permission;

pub use document::{
    Collection, Document, ObjectIndex, ObjectInstanceDoc, StoredRecord, TypeDoc, UserDoc,
    WorkspaceDoc, KEY_FIELD, NO_WORKSPACE, PUBLIC_USER,
};
pub use error::TypeError;
pub use identity::{is_integer_literal, RawId};
pub use permission::Permission;
