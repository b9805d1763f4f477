//! Error types for the edit session and its collaborators.

use shared_types::FieldTarget;

/// Rejected at queue time; the file never enters the pending upload store.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("File is empty: {0}")]
    Empty(String),

    #[error("File too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BlobError {
    /// The upload was aborted. Treated as "entry removed", never shown to the user.
    #[error("Upload cancelled")]
    Cancelled,

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob store error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BlobError {
    fn from(e: std::io::Error) -> Self {
        BlobError::Io(e.to_string())
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DocumentStoreError {
    #[error("Batch rejected: {0}")]
    Rejected(String),

    #[error("Document store error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for DocumentStoreError {
    fn from(e: sqlx::Error) -> Self {
        DocumentStoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for DocumentStoreError {
    fn from(e: serde_json::Error) -> Self {
        DocumentStoreError::Serialization(e.to_string())
    }
}

/// Single summarized failure returned to the caller of `publish()`.
/// Pending state is left intact whenever one of these is returned.
#[derive(Debug, thiserror::Error, Clone)]
pub enum PublishError {
    #[error("Publishing requires an authenticated editor")]
    Unauthenticated,

    #[error("A publish is already in progress")]
    AlreadyPublishing,

    #[error("Upload {upload_id} for {target} failed: {source}")]
    Upload {
        upload_id: String,
        target: FieldTarget,
        #[source]
        source: BlobError,
    },

    #[error("Could not resolve address for upload {upload_id} ({target}): {source}")]
    Resolve {
        upload_id: String,
        target: FieldTarget,
        #[source]
        source: BlobError,
    },

    #[error("Commit failed: {0}")]
    Commit(#[from] DocumentStoreError),
}
