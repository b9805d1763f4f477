//! Shared edit-mode types between the site editor core and the front end
//!
//! These types are used by both:
//! - the `site-editor` core (native Rust)
//! - the site's TypeScript front end (via ts-rs bindings)
//!
//! Serializable with serde for JSON between the two.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Addressing
// ============================================================================

/// One editable field on one document: (collection, document id, field).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, TS)]
#[ts(export, export_to = "../../site-ui/src/types/edit-mode.ts")]
pub struct FieldTarget {
    pub collection: String,
    pub document_id: String,
    pub field: String,
}

impl FieldTarget {
    pub fn new(
        collection: impl Into<String>,
        document_id: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            document_id: document_id.into(),
            field: field.into(),
        }
    }

    /// `collection/document_id`, the address of the document this field lives on.
    pub fn document_path(&self) -> String {
        format!("{}/{}", self.collection, self.document_id)
    }
}

impl std::fmt::Display for FieldTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.collection, self.document_id, self.field)
    }
}

// ============================================================================
// Pending State
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../site-ui/src/types/edit-mode.ts")]
pub enum ChangeKind {
    Text,
    Image,
}

/// One uncommitted scalar edit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../site-ui/src/types/edit-mode.ts")]
pub struct PendingChange {
    pub target: FieldTarget,
    /// Last-known published value when the edit was recorded
    pub previous_value: String,
    pub proposed_value: String,
    pub kind: ChangeKind,
    pub recorded_at: DateTime<Utc>,
}

impl PendingChange {
    pub fn text(
        target: FieldTarget,
        previous_value: impl Into<String>,
        proposed_value: impl Into<String>,
    ) -> Self {
        Self {
            target,
            previous_value: previous_value.into(),
            proposed_value: proposed_value.into(),
            kind: ChangeKind::Text,
            recorded_at: Utc::now(),
        }
    }

    /// True when the proposed value is identical to what was published.
    pub fn is_noop(&self) -> bool {
        self.previous_value == self.proposed_value
    }
}

/// Display view of a queued image replacement (the binary stays in the core)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../site-ui/src/types/edit-mode.ts")]
pub struct PendingUploadView {
    pub id: String,
    pub target: FieldTarget,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub preview_url: String,
    pub last_error: Option<String>,
}

/// Toolbar/indicator snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[ts(export, export_to = "../../site-ui/src/types/edit-mode.ts")]
pub struct ToolbarState {
    /// Pending text changes plus queued uploads
    pub pending_count: u32,
    pub has_changes: bool,
    pub is_edit_mode_active: bool,
    pub is_publishing: bool,
}

// ============================================================================
// Publish
// ============================================================================

/// Field patch for a single document; merged into the stored document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../site-ui/src/types/edit-mode.ts")]
pub struct DocumentPatch {
    pub collection: String,
    pub document_id: String,
    pub fields: BTreeMap<String, String>,
}

impl DocumentPatch {
    pub fn new(collection: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            document_id: document_id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn document_path(&self) -> String {
        format!("{}/{}", self.collection, self.document_id)
    }
}

/// Summary of a successful publish
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../site-ui/src/types/edit-mode.ts")]
pub struct PublishReport {
    pub documents: Vec<DocumentPatch>,
    pub uploads_performed: u32,
    pub fields_written: u32,
    pub published_by: String,
    pub published_at: DateTime<Utc>,
}

// ============================================================================
// Constants
// ============================================================================

/// Stamp fields written next to every published patch
pub const FIELD_UPDATED_AT: &str = "updatedAt";
pub const FIELD_UPDATED_BY: &str = "updatedBy";

// ============================================================================
// Tests
// ============================================================================
