use thiserror::Error;

/// Errors produced while converting between raw documents and typed records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("document in {collection} does not match the schema: {reason}")]
    Schema { collection: String, reason: String },

    #[error("unknown permission level: {0:?}")]
    UnknownPermission(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
