//! Collaborator contracts consumed by the edit session.
//!
//! Authorization, the document store and the blob store live outside this
//! crate. `backends` has in-memory, SQLite and filesystem implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{DocumentPatch, FieldTarget};

use crate::error::{BlobError, DocumentStoreError};
use crate::uploads::UploadPayload;

/// Read-only view of who is editing.
pub trait Authorization: Send + Sync {
    /// Whether the actor may enter edit mode and publish.
    fn can_edit(&self) -> bool;

    /// Stable identity stamped on commits; `None` when not signed in.
    fn actor_id(&self) -> Option<String>;
}

/// Where an upload lands in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobAddress(String);

impl BlobAddress {
    /// `collection/document/field/<millis>-<file name>`. The timestamp keeps
    /// repeated uploads for the same field from overwriting each other.
    pub fn for_upload(target: &FieldTarget, file_name: &str, at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}/{}/{}/{}-{}",
            sanitize_segment(&target.collection),
            sanitize_segment(&target.document_id),
            sanitize_segment(&target.field),
            at.timestamp_millis(),
            sanitize_segment(file_name),
        ))
    }

    pub fn from_raw(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // ".." would escape the blob root on filesystem stores
    if cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_")
    } else {
        cleaned
    }
}

/// Returned once an upload has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle {
    pub address: BlobAddress,
    pub size: u64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        address: &BlobAddress,
        payload: &UploadPayload,
    ) -> Result<BlobHandle, BlobError>;

    /// Durable retrieval address for a completed upload.
    async fn resolve_url(&self, handle: &BlobHandle) -> Result<String, BlobError>;

    /// Abort an upload that is still in flight. The caller has already
    /// dropped the upload future.
    async fn cancel(&self, address: &BlobAddress);
}

/// One atomic multi-document merge-write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBatch {
    pub patches: Vec<DocumentPatch>,
    pub updated_by: String,
}

impl CommitBatch {
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Merge every patch into its document, or none of them. Fields absent
    /// from a patch are left alone. Each written document is stamped with a
    /// server-assigned `updatedAt` and the batch's `updatedBy`.
    async fn commit_batch(&self, batch: &CommitBatch) -> Result<(), DocumentStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_blob_address_is_scoped_and_timestamped() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let target = FieldTarget::new("content", "about-story", "image");
        let address = BlobAddress::for_upload(&target, "team photo.JPG", at);
        assert_eq!(
            address.as_str(),
            "content/about-story/image/1700000000123-team_photo.JPG"
        );
    }

    #[test]
    fn test_blob_address_cannot_escape_root() {
        let at = Utc.timestamp_millis_opt(0).unwrap();
        let target = FieldTarget::new("..", "../etc", "image");
        let address = BlobAddress::for_upload(&target, "..", at);
        assert!(!address.as_str().split('/').any(|segment| segment == ".."));
    }

    #[test]
    fn test_commit_batch_empty_without_patches() {
        let mut batch = CommitBatch {
            patches: Vec::new(),
            updated_by: "ed@example.org".to_string(),
        };
        assert!(batch.is_empty());
        batch.patches.push(DocumentPatch::new("content", "home-hero"));
        assert!(!batch.is_empty());
    }
}
