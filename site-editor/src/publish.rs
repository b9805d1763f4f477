//! Publish pipeline: upload queued images, fold everything per document,
//! commit one atomic batch, then clean up what was published.
//!
//! Phases:
//! 1. upload - sequential, one `upload` + `resolve_url` per queued image
//! 2. fold - text edits and resolved image addresses grouped per document
//! 3. commit - a single `DocumentStore::commit_batch`
//! 4. cleanup - only after the commit succeeds
//!
//! The publish's cancel token is checked before uploading, after every
//! upload and before the commit. It is cancelled when the owner is torn down
//! or the editor discards mid-publish; the pipeline then returns
//! `PublishOutcome::Aborted` without committing anything.
//!
//! Blobs uploaded by an attempt that later fails are not deleted.

use std::collections::BTreeMap;

use chrono::Utc;
use shared_types::{DocumentPatch, FieldTarget, PendingChange, PublishReport};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::change_key::ChangeKey;
use crate::error::{BlobError, PublishError};
use crate::ports::{BlobAddress, CommitBatch};
use crate::session::EditSession;
use crate::uploads::UploadJob;

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// Both stores were empty; no remote call was made.
    NothingToPublish,
    Published(PublishReport),
    /// The owning context went away or the edits were discarded
    /// mid-publish. Nothing was committed.
    Aborted,
}

impl PublishOutcome {
    pub fn report(&self) -> Option<&PublishReport> {
        match self {
            PublishOutcome::Published(report) => Some(report),
            _ => None,
        }
    }
}

/// An upload that finished and has a retrieval address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUpload {
    pub id: String,
    pub target: FieldTarget,
    pub url: String,
}

/// Group text edits and resolved uploads into one patch per document.
/// An image written to the same field as a text edit wins.
pub fn fold_patches(
    changes: &[(ChangeKey, PendingChange)],
    uploads: &[ResolvedUpload],
) -> Vec<DocumentPatch> {
    let mut folded: BTreeMap<(String, String), DocumentPatch> = BTreeMap::new();

    let text = changes
        .iter()
        .map(|(_, change)| (&change.target, change.proposed_value.as_str()));
    let images = uploads
        .iter()
        .map(|upload| (&upload.target, upload.url.as_str()));

    for (target, value) in text.chain(images) {
        folded
            .entry((target.collection.clone(), target.document_id.clone()))
            .or_insert_with(|| DocumentPatch::new(&target.collection, &target.document_id))
            .fields
            .insert(target.field.clone(), value.to_string());
    }

    folded.into_values().collect()
}

enum UploadStep {
    Resolved(ResolvedUpload),
    /// Entry was removed or its upload cancelled; leave it out of this publish.
    Skipped,
}

pub(crate) async fn run(
    session: &EditSession,
    cancel: CancellationToken,
    actor_id: String,
    changes: Vec<(ChangeKey, PendingChange)>,
    uploads: Vec<UploadJob>,
) -> Result<PublishOutcome, PublishError> {
    let liveness = session.liveness();
    info!(
        changes = changes.len(),
        uploads = uploads.len(),
        actor = %actor_id,
        "publish started"
    );

    if cancel.is_cancelled() {
        warn!(torn_down = !liveness.is_live(), "publish cancelled before upload phase");
        return Ok(PublishOutcome::Aborted);
    }

    let mut resolved = Vec::with_capacity(uploads.len());
    for job in uploads {
        let step = upload_one(session, &cancel, &job).await;
        if cancel.is_cancelled() {
            warn!(
                upload_id = %job.id,
                torn_down = !liveness.is_live(),
                "publish cancelled during upload phase"
            );
            return Ok(PublishOutcome::Aborted);
        }
        match step? {
            UploadStep::Resolved(upload) => resolved.push(upload),
            UploadStep::Skipped => {}
        }
    }

    if cancel.is_cancelled() {
        return Ok(PublishOutcome::Aborted);
    }

    let batch = CommitBatch {
        patches: fold_patches(&changes, &resolved),
        updated_by: actor_id.clone(),
    };
    if batch.is_empty() {
        debug!("every queued upload was cancelled, nothing left to commit");
        return Ok(PublishOutcome::NothingToPublish);
    }
    let fields_written = batch
        .patches
        .iter()
        .map(|patch| patch.fields.len())
        .sum::<usize>();

    if let Err(e) = session.documents().commit_batch(&batch).await {
        warn!(error = %e, documents = batch.patches.len(), "commit rejected, pending edits kept");
        return Err(PublishError::Commit(e));
    }

    let report = PublishReport {
        documents: batch.patches,
        uploads_performed: resolved.len() as u32,
        fields_written: fields_written as u32,
        published_by: actor_id,
        published_at: Utc::now(),
    };

    if cancel.is_cancelled() {
        warn!(torn_down = !liveness.is_live(), "publish cancelled after commit, skipping cleanup");
        return Ok(PublishOutcome::Published(report));
    }

    let published_ids: Vec<String> = resolved.iter().map(|upload| upload.id.clone()).collect();
    session.finish_publish(&changes, &published_ids);

    info!(
        documents = report.documents.len(),
        fields = report.fields_written,
        uploads = report.uploads_performed,
        "publish committed"
    );
    Ok(PublishOutcome::Published(report))
}

async fn upload_one(
    session: &EditSession,
    cancel: &CancellationToken,
    job: &UploadJob,
) -> Result<UploadStep, PublishError> {
    if job.cancel.is_cancelled() {
        debug!(upload_id = %job.id, "upload removed before its turn");
        return Ok(UploadStep::Skipped);
    }

    let blobs = session.blobs();
    let address = BlobAddress::for_upload(&job.target, &job.payload.file_name, Utc::now());
    debug!(upload_id = %job.id, address = %address, "uploading");

    let uploaded = tokio::select! {
        biased;
        _ = job.cancel.cancelled() => {
            blobs.cancel(&address).await;
            Err(BlobError::Cancelled)
        }
        result = blobs.upload(&address, &job.payload) => result,
    };

    let handle = match uploaded {
        Ok(handle) => handle,
        Err(BlobError::Cancelled) => {
            // A cancelled publish leaves the stores alone; the caller aborts.
            if !cancel.is_cancelled() {
                warn!(upload_id = %job.id, "upload cancelled, dropping entry");
                session.remove_upload(&job.id);
            }
            return Ok(UploadStep::Skipped);
        }
        Err(source) => {
            warn!(upload_id = %job.id, error = %source, "upload failed");
            session.record_upload_error(&job.id, source.to_string());
            return Err(PublishError::Upload {
                upload_id: job.id.clone(),
                target: job.target.clone(),
                source,
            });
        }
    };

    match blobs.resolve_url(&handle).await {
        Ok(url) => {
            session.clear_upload_error(&job.id);
            Ok(UploadStep::Resolved(ResolvedUpload {
                id: job.id.clone(),
                target: job.target.clone(),
                url,
            }))
        }
        Err(BlobError::Cancelled) => {
            if !cancel.is_cancelled() {
                session.remove_upload(&job.id);
            }
            Ok(UploadStep::Skipped)
        }
        Err(source) => {
            warn!(upload_id = %job.id, error = %source, "resolving upload address failed");
            session.record_upload_error(&job.id, source.to_string());
            Err(PublishError::Resolve {
                upload_id: job.id.clone(),
                target: job.target.clone(),
                source,
            })
        }
    }
}
