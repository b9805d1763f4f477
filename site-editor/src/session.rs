//! Edit session - pending changes, pending uploads and the edit mode bit for
//! one editor's browser context.
//!
//! Store mutations are synchronous and never suspend. `publish` is the only
//! async entry point; it snapshots both stores, works on the snapshot and
//! only touches the stores again to record errors or clean up after a
//! successful commit. Edits made while a publish is in flight stay pending
//! for the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared_types::{FieldTarget, PendingChange, PendingUploadView, ToolbarState};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::change_key::ChangeKey;
use crate::changes::PendingChangeStore;
use crate::error::{PublishError, ValidationError};
use crate::liveness::LivenessGuard;
use crate::ports::{Authorization, BlobStore, DocumentStore};
use crate::preview::{PreviewHandle, PreviewRegistry};
use crate::publish::{self, PublishOutcome};
use crate::toggle::EditModeToggle;
use crate::uploads::{PendingUpload, PendingUploadStore, UploadPayload};
use crate::validation::UploadPolicy;

pub struct EditSessionArguments {
    pub authorization: Arc<dyn Authorization>,
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub previews: Arc<dyn PreviewRegistry>,
    pub upload_policy: UploadPolicy,
}

#[derive(Debug, Default)]
struct SessionState {
    changes: PendingChangeStore,
    uploads: PendingUploadStore,
    toggle: EditModeToggle,
}

struct EditSessionInner {
    state: Mutex<SessionState>,
    authorization: Arc<dyn Authorization>,
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    previews: Arc<dyn PreviewRegistry>,
    upload_policy: UploadPolicy,
    liveness: LivenessGuard,
    publishing: AtomicBool,
    /// Cancelled by `discard` or teardown while a publish is in flight
    publish_cancel: Mutex<Option<CancellationToken>>,
}

/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct EditSession {
    inner: Arc<EditSessionInner>,
}

impl EditSession {
    pub fn new(args: EditSessionArguments) -> Self {
        Self {
            inner: Arc::new(EditSessionInner {
                state: Mutex::new(SessionState::default()),
                authorization: args.authorization,
                documents: args.documents,
                blobs: args.blobs,
                previews: args.previews,
                upload_policy: args.upload_policy,
                liveness: LivenessGuard::new(),
                publishing: AtomicBool::new(false),
                publish_cancel: Mutex::new(None),
            }),
        }
    }

    // Critical sections are short and never span an await, so a poisoned
    // lock still holds consistent state.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        locked(&self.inner.state)
    }

    pub(crate) fn documents(&self) -> Arc<dyn DocumentStore> {
        self.inner.documents.clone()
    }

    pub(crate) fn blobs(&self) -> Arc<dyn BlobStore> {
        self.inner.blobs.clone()
    }

    pub fn liveness(&self) -> LivenessGuard {
        self.inner.liveness.clone()
    }

    /// Called by the owning UI context when it goes away. Cancels any
    /// in-flight upload and makes a running publish stop without committing.
    pub fn tear_down(&self) {
        info!("edit session torn down");
        self.inner.liveness.tear_down();
    }

    // ------------------------------------------------------------------
    // Edit mode
    // ------------------------------------------------------------------

    pub fn is_authorized(&self) -> bool {
        self.inner.authorization.can_edit()
    }

    pub fn is_edit_mode_active(&self) -> bool {
        self.lock().toggle.is_active(self.is_authorized())
    }

    /// Leaving edit mode keeps every pending entry.
    pub fn toggle_edit_mode(&self) {
        let authorized = self.is_authorized();
        self.lock().toggle.toggle(authorized);
    }

    pub fn set_edit_mode(&self, enabled: bool) {
        let authorized = self.is_authorized();
        self.lock().toggle.set(authorized, enabled);
    }

    // ------------------------------------------------------------------
    // Pending changes
    // ------------------------------------------------------------------

    pub fn record_change(&self, key: ChangeKey, change: PendingChange) {
        self.lock().changes.record_change(key, change);
    }

    pub fn clear_change(&self, key: &ChangeKey) {
        self.lock().changes.clear_change(key);
    }

    pub fn has_change(&self, key: &ChangeKey) -> bool {
        self.lock().changes.has_change(key)
    }

    pub fn current_value_for(&self, key: &ChangeKey, fallback: &str) -> String {
        self.lock().changes.current_value_for(key, fallback)
    }

    pub fn pending_change(&self, key: &ChangeKey) -> Option<PendingChange> {
        self.lock().changes.get(key).cloned()
    }

    pub fn change_count(&self) -> usize {
        self.lock().changes.count()
    }

    // ------------------------------------------------------------------
    // Pending uploads
    // ------------------------------------------------------------------

    /// Validate `payload`, create its preview and queue it for `target`,
    /// replacing any upload already queued for that field.
    pub fn queue_upload(
        &self,
        target: FieldTarget,
        payload: UploadPayload,
    ) -> Result<String, ValidationError> {
        self.inner.upload_policy.validate(&payload)?;

        let preview = PreviewHandle::create(self.inner.previews.clone(), &payload);
        let entry = PendingUpload::new(target, payload, preview, self.inner.liveness.child_token());
        let id = entry.id.clone();
        if let Some(replaced) = self.lock().uploads.queue_upload(entry) {
            debug!(replaced = %replaced, upload_id = %id, "replaced queued upload");
        }
        Ok(id)
    }

    pub fn remove_upload(&self, id: &str) -> bool {
        self.lock().uploads.remove_upload(id)
    }

    pub fn lookup_by_target(&self, target: &FieldTarget) -> Option<PendingUploadView> {
        self.lock()
            .uploads
            .lookup_by_target(&target.collection, &target.document_id, &target.field)
            .map(PendingUpload::view)
    }

    pub fn pending_uploads(&self) -> Vec<PendingUploadView> {
        self.lock().uploads.views()
    }

    pub fn upload_count(&self) -> usize {
        self.lock().uploads.count()
    }

    pub(crate) fn record_upload_error(&self, id: &str, message: String) {
        self.lock().uploads.record_error(id, message);
    }

    pub(crate) fn clear_upload_error(&self, id: &str) {
        self.lock().uploads.clear_error(id);
    }

    // ------------------------------------------------------------------
    // Toolbar
    // ------------------------------------------------------------------

    /// Pending text changes plus queued uploads.
    pub fn count(&self) -> usize {
        let state = self.lock();
        state.changes.count() + state.uploads.count()
    }

    pub fn has_changes(&self) -> bool {
        let state = self.lock();
        !state.changes.is_empty() || !state.uploads.is_empty()
    }

    pub fn is_publishing(&self) -> bool {
        self.inner.publishing.load(Ordering::Acquire)
    }

    pub fn toolbar_state(&self) -> ToolbarState {
        let authorized = self.is_authorized();
        let state = self.lock();
        let pending = state.changes.count() + state.uploads.count();
        ToolbarState {
            pending_count: u32::try_from(pending).unwrap_or(u32::MAX),
            has_changes: pending > 0,
            is_edit_mode_active: state.toggle.is_active(authorized),
            is_publishing: self.is_publishing(),
        }
    }

    /// Release every preview and empty both stores. No remote calls.
    /// A publish in flight is cancelled and commits nothing.
    pub fn discard(&self) -> usize {
        if let Some(cancel) = locked(&self.inner.publish_cancel).as_ref() {
            info!("discard cancelled the publish in flight");
            cancel.cancel();
        }
        let mut state = self.lock();
        let changes = state.changes.count();
        state.changes.clear();
        let uploads = state.uploads.clear();
        info!(changes, uploads, "discarded pending edits");
        changes + uploads
    }

    /// Upload queued images, then commit every pending edit in one atomic batch.
    ///
    /// On failure both stores are left as they were so the caller can retry.
    pub async fn publish(&self) -> Result<PublishOutcome, PublishError> {
        let (changes, uploads) = {
            let state = self.lock();
            (state.changes.drain_all(), state.uploads.drain_all())
        };
        if changes.is_empty() && uploads.is_empty() {
            debug!("nothing to publish");
            return Ok(PublishOutcome::NothingToPublish);
        }

        let actor_id = self
            .inner
            .authorization
            .actor_id()
            .filter(|_| self.is_authorized())
            .ok_or(PublishError::Unauthenticated)?;

        let flight = PublishFlight::begin(&self.inner)?;
        publish::run(self, flight.cancel_token(), actor_id, changes, uploads).await
    }

    /// Remove exactly what a successful publish wrote.
    pub(crate) fn finish_publish(&self, changes: &[(ChangeKey, PendingChange)], upload_ids: &[String]) {
        let mut state = self.lock();
        for (key, change) in changes {
            state.changes.clear_if_unchanged(key, &change.proposed_value);
        }
        state.uploads.complete(upload_ids);
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the publishing flag and the publish's cancel token for the
/// duration of one publish.
struct PublishFlight<'a> {
    inner: &'a EditSessionInner,
    cancel: CancellationToken,
}

impl<'a> PublishFlight<'a> {
    fn begin(inner: &'a EditSessionInner) -> Result<Self, PublishError> {
        inner
            .publishing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PublishError::AlreadyPublishing)?;
        let cancel = inner.liveness.child_token();
        *locked(&inner.publish_cancel) = Some(cancel.clone());
        Ok(Self { inner, cancel })
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for PublishFlight<'_> {
    fn drop(&mut self) {
        locked(&self.inner.publish_cancel).take();
        self.inner.publishing.store(false, Ordering::Release);
    }
}
