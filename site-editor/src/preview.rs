//! Client-local preview references for queued images.
//!
//! A preview is the browser's object URL for the picked file. It is created
//! when an upload is queued and revoked when the entry leaves the pending
//! upload store. `PreviewHandle` revokes at most once: explicit release
//! marks it, and drop releases anything still live.

use std::sync::Arc;

use tracing::debug;

use crate::uploads::UploadPayload;

/// Creates and revokes preview references (object URLs in the browser).
pub trait PreviewRegistry: Send + Sync {
    fn create(&self, payload: &UploadPayload) -> String;
    fn revoke(&self, url: &str);
}

pub struct PreviewHandle {
    url: String,
    registry: Arc<dyn PreviewRegistry>,
    released: bool,
}

impl PreviewHandle {
    pub fn create(registry: Arc<dyn PreviewRegistry>, payload: &UploadPayload) -> Self {
        let url = registry.create(payload);
        Self {
            url,
            registry,
            released: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Revoke the preview. Returns false if it was already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.registry.revoke(&self.url);
        debug!(url = %self.url, "revoked preview");
        true
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("url", &self.url)
            .field("released", &self.released)
            .finish()
    }
}
