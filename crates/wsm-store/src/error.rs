use wsm_types::Collection;

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store cannot be reached or opened.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The supplied credentials were rejected.
    #[error("authentication failed for user {0:?}")]
    AuthenticationFailed(String),

    /// The store requires authentication and none has succeeded yet.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A document carries a primary key that is not a string.
    #[error("invalid primary key in {collection}: {reason}")]
    InvalidKey { collection: Collection, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
