//! In-memory collaborators for local development and tests.
//!
//! Each keeps call counters and offers failure injection so publish
//! behavior can be observed without a remote backend.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{Notify, Semaphore};

use crate::error::{BlobError, DocumentStoreError};
use crate::ports::{Authorization, BlobAddress, BlobHandle, BlobStore, CommitBatch, DocumentStore};
use crate::preview::PreviewRegistry;
use crate::uploads::UploadPayload;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Authorization
// ============================================================================

#[derive(Debug, Clone)]
pub struct StaticAuthorization {
    pub can_edit: bool,
    pub actor_id: Option<String>,
}

impl StaticAuthorization {
    pub fn editor(actor_id: impl Into<String>) -> Self {
        Self {
            can_edit: true,
            actor_id: Some(actor_id.into()),
        }
    }

    pub fn visitor() -> Self {
        Self {
            can_edit: false,
            actor_id: None,
        }
    }
}

impl Authorization for StaticAuthorization {
    fn can_edit(&self) -> bool {
        self.can_edit
    }

    fn actor_id(&self) -> Option<String> {
        self.actor_id.clone()
    }
}

// ============================================================================
// Previews
// ============================================================================

/// Hands out `blob:` style URLs and counts revocations per URL.
#[derive(Debug)]
pub struct ObjectUrlRegistry {
    origin: String,
    urls: Mutex<HashMap<String, usize>>,
}

impl Default for ObjectUrlRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::with_origin("http://localhost")
    }

    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            urls: Mutex::new(HashMap::new()),
        }
    }

    pub fn revocations(&self, url: &str) -> usize {
        locked(&self.urls).get(url).copied().unwrap_or(0)
    }

    pub fn total_revocations(&self) -> usize {
        locked(&self.urls).values().sum()
    }

    /// Created and not yet revoked.
    pub fn live_count(&self) -> usize {
        locked(&self.urls).values().filter(|count| **count == 0).count()
    }
}

impl PreviewRegistry for ObjectUrlRegistry {
    fn create(&self, _payload: &UploadPayload) -> String {
        let url = format!("blob:{}/{}", self.origin, uuid::Uuid::new_v4());
        locked(&self.urls).insert(url.clone(), 0);
        url
    }

    fn revoke(&self, url: &str) {
        *locked(&self.urls).entry(url.to_string()).or_insert(0) += 1;
    }
}

// ============================================================================
// Document store
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub fields: BTreeMap<String, String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<BTreeMap<String, StoredDocument>>,
    batches: Mutex<Vec<CommitBatch>>,
    commit_calls: AtomicUsize,
    reject_commits: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, collection: &str, document_id: &str, fields: &[(&str, &str)]) {
        let fields = fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        locked(&self.documents).insert(
            format!("{collection}/{document_id}"),
            StoredDocument {
                fields,
                updated_at: None,
                updated_by: None,
            },
        );
    }

    pub fn document(&self, collection: &str, document_id: &str) -> Option<StoredDocument> {
        locked(&self.documents)
            .get(&format!("{collection}/{document_id}"))
            .cloned()
    }

    pub fn reject_commits(&self, reject: bool) {
        self.reject_commits.store(reject, Ordering::SeqCst);
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<CommitBatch> {
        locked(&self.batches).clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn commit_batch(&self, batch: &CommitBatch) -> Result<(), DocumentStoreError> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.batches).push(batch.clone());

        if self.reject_commits.load(Ordering::SeqCst) {
            return Err(DocumentStoreError::Rejected(
                "commit rejected by test store".to_string(),
            ));
        }

        // One lock for the whole batch: readers see all patches or none.
        let mut documents = locked(&self.documents);
        let now = Utc::now();
        for patch in &batch.patches {
            let doc = documents
                .entry(patch.document_path())
                .or_insert_with(|| StoredDocument {
                    fields: BTreeMap::new(),
                    updated_at: None,
                    updated_by: None,
                });
            doc.fields
                .extend(patch.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            doc.updated_at = Some(now);
            doc.updated_by = Some(batch.updated_by.clone());
        }
        Ok(())
    }
}

// ============================================================================
// Blob store
// ============================================================================

#[derive(Debug)]
pub struct InMemoryBlobStore {
    public_base_url: String,
    blobs: Mutex<BTreeMap<String, Bytes>>,
    failing_documents: Mutex<HashSet<String>>,
    gated: AtomicBool,
    gate: Semaphore,
    upload_started: Notify,
    upload_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
    cancelled: Mutex<Vec<String>>,
}

impl InMemoryBlobStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into(),
            blobs: Mutex::new(BTreeMap::new()),
            failing_documents: Mutex::new(HashSet::new()),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            upload_started: Notify::new(),
            upload_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    /// Uploads addressed to this document fail with a backend error.
    pub fn fail_uploads_for(&self, collection: &str, document_id: &str) {
        locked(&self.failing_documents).insert(format!("{collection}/{document_id}/"));
    }

    /// Uploads wait until `release_uploads` lets them through (or they are cancelled).
    pub fn hold_uploads(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release_uploads(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Resolves once an upload call has started.
    pub async fn wait_for_upload_start(&self) {
        self.upload_started.notified().await;
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> Vec<String> {
        locked(&self.cancelled).clone()
    }

    pub fn stored_addresses(&self) -> Vec<String> {
        locked(&self.blobs).keys().cloned().collect()
    }

    pub fn get(&self, address: &str) -> Option<Bytes> {
        locked(&self.blobs).get(address).cloned()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(
        &self,
        address: &BlobAddress,
        payload: &UploadPayload,
    ) -> Result<BlobHandle, BlobError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.upload_started.notify_one();

        if self.gated.load(Ordering::SeqCst) {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| BlobError::Backend(e.to_string()))?;
            permit.forget();
        }

        let failing = locked(&self.failing_documents)
            .iter()
            .any(|prefix| address.as_str().starts_with(prefix.as_str()));
        if failing {
            return Err(BlobError::Backend(format!("upload to {address} refused")));
        }

        locked(&self.blobs).insert(address.as_str().to_string(), payload.bytes.clone());
        Ok(BlobHandle {
            address: address.clone(),
            size: payload.size(),
        })
    }

    async fn resolve_url(&self, handle: &BlobHandle) -> Result<String, BlobError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if !locked(&self.blobs).contains_key(handle.address.as_str()) {
            return Err(BlobError::NotFound(handle.address.to_string()));
        }
        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            handle.address
        ))
    }

    async fn cancel(&self, address: &BlobAddress) {
        locked(&self.cancelled).push(address.as_str().to_string());
        locked(&self.blobs).remove(address.as_str());
    }
}
