//! JSON edit scripts replayed into a session by the command line tool.
//!
//! ```json
//! {
//!   "actor_id": "editor@example.org",
//!   "text": [
//!     { "collection": "content", "document_id": "home-hero", "field": "title",
//!       "published": "Welcome", "value": "Hello" }
//!   ],
//!   "images": [
//!     { "collection": "content", "document_id": "about-story", "field": "image",
//!       "path": "story.jpg" }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use shared_types::FieldTarget;

use crate::adapters::{ImageField, TextField};
use crate::session::EditSession;
use crate::uploads::UploadPayload;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EditScript {
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub text: Vec<TextEdit>,
    #[serde(default)]
    pub images: Vec<ImageEdit>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TextEdit {
    pub collection: String,
    pub document_id: String,
    pub field: String,
    #[serde(default)]
    pub published: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ImageEdit {
    pub collection: String,
    pub document_id: String,
    pub field: String,
    pub path: PathBuf,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Invalid edit script: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image {path} rejected: {reason}")]
    Rejected { path: PathBuf, reason: String },
}

impl EditScript {
    pub fn parse(raw: &str) -> Result<Self, ScriptError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Record every edit through the field adapters. Image paths are
    /// resolved relative to `base_dir`.
    pub async fn apply(&self, session: &EditSession, base_dir: &Path) -> Result<(), ScriptError> {
        for edit in &self.text {
            TextField::new(
                FieldTarget::new(&edit.collection, &edit.document_id, &edit.field),
                edit.published.clone(),
            )
            .edit(session, edit.value.clone());
        }

        for edit in &self.images {
            let path = base_dir.join(&edit.path);
            let bytes = tokio::fs::read(&path).await.map_err(|source| ScriptError::Read {
                path: path.clone(),
                source,
            })?;
            let content_type = edit
                .content_type
                .clone()
                .unwrap_or_else(|| guess_content_type(&path).to_string());
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload".to_string());

            let mut field = ImageField::new(
                FieldTarget::new(&edit.collection, &edit.document_id, &edit.field),
                "",
            );
            field
                .pick_file(session, UploadPayload::new(file_name, content_type, bytes))
                .map_err(|e| ScriptError::Rejected {
                    path,
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
