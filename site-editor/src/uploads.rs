//! Pending upload store - queued image replacements awaiting publish.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use shared_types::{FieldTarget, PendingUploadView};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::preview::PreviewHandle;

/// The picked file. Cloning shares the underlying buffer.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadPayload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug)]
pub struct PendingUpload {
    pub id: String,
    pub target: FieldTarget,
    pub queued_at: DateTime<Utc>,
    payload: UploadPayload,
    preview: PreviewHandle,
    /// Cancelled when the entry is removed or the owning session is torn down
    cancel: CancellationToken,
    last_error: Option<String>,
}

impl PendingUpload {
    pub fn new(
        target: FieldTarget,
        payload: UploadPayload,
        preview: PreviewHandle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            target,
            queued_at: Utc::now(),
            payload,
            preview,
            cancel,
            last_error: None,
        }
    }

    pub fn payload(&self) -> &UploadPayload {
        &self.payload
    }

    pub fn preview_url(&self) -> &str {
        self.preview.url()
    }

    pub fn is_preview_released(&self) -> bool {
        self.preview.is_released()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn view(&self) -> PendingUploadView {
        PendingUploadView {
            id: self.id.clone(),
            target: self.target.clone(),
            file_name: self.payload.file_name.clone(),
            content_type: self.payload.content_type.clone(),
            size_bytes: self.payload.size(),
            preview_url: self.preview.url().to_string(),
            last_error: self.last_error.clone(),
        }
    }

    fn job(&self) -> UploadJob {
        UploadJob {
            id: self.id.clone(),
            target: self.target.clone(),
            payload: self.payload.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

/// What the publish pipeline needs to upload one entry.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub id: String,
    pub target: FieldTarget,
    pub payload: UploadPayload,
    pub cancel: CancellationToken,
}

/// Entries are kept in queue order; uploads run in that order.
#[derive(Debug, Default)]
pub struct PendingUploadStore {
    entries: BTreeMap<u64, PendingUpload>,
    by_id: HashMap<String, u64>,
    next_seq: u64,
}

impl PendingUploadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` keyed by its id. Any other entry for the same target is
    /// removed first, so a field never has more than one queued upload.
    /// Returns the id of the replaced entry, if any.
    pub fn queue_upload(&mut self, entry: PendingUpload) -> Option<String> {
        let replaced = self
            .lookup_by_target(&entry.target.collection, &entry.target.document_id, &entry.target.field)
            .map(|existing| existing.id.clone());
        if let Some(existing_id) = &replaced {
            self.remove_upload(existing_id);
        }
        self.remove_upload(&entry.id);

        debug!(upload_id = %entry.id, target = %entry.target, "queued upload");
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_id.insert(entry.id.clone(), seq);
        self.entries.insert(seq, entry);
        replaced
    }

    /// Remove the entry, cancel any in-flight upload for it and release its
    /// preview. No-op for an unknown id.
    pub fn remove_upload(&mut self, id: &str) -> bool {
        let Some(mut entry) = self.take(id) else {
            return false;
        };
        entry.cancel.cancel();
        entry.preview.release();
        debug!(upload_id = %id, "removed upload");
        true
    }

    pub fn get(&self, id: &str) -> Option<&PendingUpload> {
        self.by_id.get(id).and_then(|seq| self.entries.get(seq))
    }

    pub fn lookup_by_target(
        &self,
        collection: &str,
        document_id: &str,
        field: &str,
    ) -> Option<&PendingUpload> {
        self.entries.values().find(|entry| {
            entry.target.collection == collection
                && entry.target.document_id == document_id
                && entry.target.field == field
        })
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every entry in queue order. Does not mutate the store.
    pub fn drain_all(&self) -> Vec<UploadJob> {
        self.entries.values().map(PendingUpload::job).collect()
    }

    pub fn views(&self) -> Vec<PendingUploadView> {
        self.entries.values().map(PendingUpload::view).collect()
    }

    pub fn record_error(&mut self, id: &str, message: impl Into<String>) {
        if let Some(seq) = self.by_id.get(id) {
            if let Some(entry) = self.entries.get_mut(seq) {
                entry.last_error = Some(message.into());
            }
        }
    }

    pub fn clear_error(&mut self, id: &str) {
        if let Some(seq) = self.by_id.get(id) {
            if let Some(entry) = self.entries.get_mut(seq) {
                entry.last_error = None;
            }
        }
    }

    /// Drop entries whose uploads were published. Their previews are released;
    /// nothing is cancelled since the uploads already finished.
    pub fn complete(&mut self, ids: &[String]) -> usize {
        let mut completed = 0;
        for id in ids {
            if let Some(mut entry) = self.take(id) {
                entry.preview.release();
                completed += 1;
            }
        }
        completed
    }

    /// Release every preview, cancel every in-flight upload and empty the store.
    /// Returns how many entries were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        for (_, mut entry) in std::mem::take(&mut self.entries) {
            entry.cancel.cancel();
            entry.preview.release();
        }
        self.by_id.clear();
        removed
    }

    fn take(&mut self, id: &str) -> Option<PendingUpload> {
        let seq = self.by_id.remove(id)?;
        self.entries.remove(&seq)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backends::memory::ObjectUrlRegistry;

    fn entry(registry: &Arc<ObjectUrlRegistry>, target: FieldTarget) -> PendingUpload {
        let payload = UploadPayload::new("photo.jpg", "image/jpeg", vec![0xFFu8, 0xD8, 0xFF]);
        let preview = PreviewHandle::create(registry.clone(), &payload);
        PendingUpload::new(target, payload, preview, CancellationToken::new())
    }

    #[test]
    fn test_remove_releases_preview_exactly_once() {
        let registry = Arc::new(ObjectUrlRegistry::new());
        let mut store = PendingUploadStore::new();
        let upload = entry(&registry, FieldTarget::new("content", "about-story", "image"));
        let id = upload.id.clone();
        let url = upload.preview_url().to_string();
        store.queue_upload(upload);

        assert!(store.remove_upload(&id));
        assert!(!store.remove_upload(&id));

        assert_eq!(registry.revocations(&url), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_cancels_entry_token() {
        let registry = Arc::new(ObjectUrlRegistry::new());
        let mut store = PendingUploadStore::new();
        let upload = entry(&registry, FieldTarget::new("content", "about-story", "image"));
        let id = upload.id.clone();
        store.queue_upload(upload);
        let job = store.drain_all().remove(0);

        store.remove_upload(&id);

        assert!(job.cancel.is_cancelled());
    }

    #[test]
    fn test_requeue_for_same_target_replaces_entry() {
        let registry = Arc::new(ObjectUrlRegistry::new());
        let mut store = PendingUploadStore::new();
        let target = FieldTarget::new("team", "chair", "photo");
        let first = entry(&registry, target.clone());
        let first_id = first.id.clone();
        let first_url = first.preview_url().to_string();
        store.queue_upload(first);

        let replaced = store.queue_upload(entry(&registry, target.clone()));

        assert_eq!(replaced.as_deref(), Some(first_id.as_str()));
        assert_eq!(store.count(), 1);
        assert_eq!(registry.revocations(&first_url), 1);
        assert_ne!(
            store.lookup_by_target("team", "chair", "photo").map(|u| u.id.clone()),
            Some(first_id)
        );
    }

    #[test]
    fn test_drain_all_preserves_queue_order() {
        let registry = Arc::new(ObjectUrlRegistry::new());
        let mut store = PendingUploadStore::new();
        for doc in ["a", "b", "c"] {
            store.queue_upload(entry(&registry, FieldTarget::new("content", doc, "image")));
        }

        let docs: Vec<String> = store
            .drain_all()
            .into_iter()
            .map(|job| job.target.document_id)
            .collect();
        assert_eq!(docs, vec!["a", "b", "c"]);
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn test_clear_releases_everything() {
        let registry = Arc::new(ObjectUrlRegistry::new());
        let mut store = PendingUploadStore::new();
        store.queue_upload(entry(&registry, FieldTarget::new("content", "a", "image")));
        store.queue_upload(entry(&registry, FieldTarget::new("content", "b", "image")));

        assert_eq!(store.clear(), 2);
        assert_eq!(store.clear(), 0);
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.total_revocations(), 2);
    }

    #[test]
    fn test_record_error_is_visible_in_view() {
        let registry = Arc::new(ObjectUrlRegistry::new());
        let mut store = PendingUploadStore::new();
        let upload = entry(&registry, FieldTarget::new("content", "a", "image"));
        let id = upload.id.clone();
        store.queue_upload(upload);

        store.record_error(&id, "connection reset");

        let view = store.views().remove(0);
        assert_eq!(view.last_error.as_deref(), Some("connection reset"));
        assert_eq!(view.size_bytes, 3);
    }
}
