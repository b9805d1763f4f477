//! Editable field bindings used by the presentation layer.
//!
//! Adapters never talk to the remote stores; they only read and write the
//! session's pending state for one (collection, document, field).

use shared_types::{FieldTarget, PendingChange};

use crate::change_key::ChangeKey;
use crate::error::ValidationError;
use crate::session::EditSession;
use crate::uploads::UploadPayload;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextField {
    target: FieldTarget,
    key: ChangeKey,
    published_value: String,
}

impl TextField {
    pub fn new(target: FieldTarget, published_value: impl Into<String>) -> Self {
        let key = ChangeKey::for_target(&target);
        Self {
            target,
            key,
            published_value: published_value.into(),
        }
    }

    pub fn target(&self) -> &FieldTarget {
        &self.target
    }

    /// Called when a fresh published value arrives from the document store.
    pub fn set_published_value(&mut self, value: impl Into<String>) {
        self.published_value = value.into();
    }

    /// What to render: the pending edit if any, else the published value.
    pub fn display_value(&self, session: &EditSession) -> String {
        session.current_value_for(&self.key, &self.published_value)
    }

    pub fn is_pending(&self, session: &EditSession) -> bool {
        session.has_change(&self.key)
    }

    /// Typing the published value back in drops the pending edit rather
    /// than storing a no-op.
    pub fn edit(&self, session: &EditSession, value: impl Into<String>) {
        let change =
            PendingChange::text(self.target.clone(), self.published_value.clone(), value);
        if change.is_noop() {
            session.clear_change(&self.key);
            return;
        }
        session.record_change(self.key.clone(), change);
    }

    pub fn revert(&self, session: &EditSession) {
        session.clear_change(&self.key);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageField {
    target: FieldTarget,
    published_url: String,
    /// Queue-time rejection for the last picked file
    validation_error: Option<ValidationError>,
}

impl ImageField {
    pub fn new(target: FieldTarget, published_url: impl Into<String>) -> Self {
        Self {
            target,
            published_url: published_url.into(),
            validation_error: None,
        }
    }

    pub fn target(&self) -> &FieldTarget {
        &self.target
    }

    pub fn set_published_url(&mut self, url: impl Into<String>) {
        self.published_url = url.into();
    }

    /// Preview of the queued replacement, else the published image.
    pub fn display_url(&self, session: &EditSession) -> String {
        session
            .lookup_by_target(&self.target)
            .map(|upload| upload.preview_url)
            .unwrap_or_else(|| self.published_url.clone())
    }

    pub fn is_pending(&self, session: &EditSession) -> bool {
        session.lookup_by_target(&self.target).is_some()
    }

    /// Validation rejection for the last pick, or the upload error recorded
    /// by the last failed publish.
    pub fn error(&self, session: &EditSession) -> Option<String> {
        if let Some(err) = &self.validation_error {
            return Some(err.to_string());
        }
        session
            .lookup_by_target(&self.target)
            .and_then(|upload| upload.last_error)
    }

    /// Queue `payload` as this field's replacement. A rejected file leaves
    /// any previously queued replacement in place.
    pub fn pick_file(
        &mut self,
        session: &EditSession,
        payload: UploadPayload,
    ) -> Result<String, ValidationError> {
        match session.queue_upload(self.target.clone(), payload) {
            Ok(id) => {
                self.validation_error = None;
                Ok(id)
            }
            Err(e) => {
                self.validation_error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn remove_pending(&mut self, session: &EditSession) -> bool {
        self.validation_error = None;
        match session.lookup_by_target(&self.target) {
            Some(upload) => session.remove_upload(&upload.id),
            None => false,
        }
    }
}
