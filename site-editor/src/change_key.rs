//! Change key codec.
//!
//! A change key names one editable field on one document. Every adapter
//! bound to the same logical field derives the same key, which is what lets
//! the pending change store collapse their edits into a single slot.
//!
//! Segments are joined with `/`. Any `/` or `%` inside a segment is
//! percent-escaped first, so distinct triples can never produce the same key.

use serde::{Deserialize, Serialize};
use shared_types::FieldTarget;

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeKey(String);

impl ChangeKey {
    pub fn of(collection: &str, document_id: &str, field: &str) -> Self {
        let mut key = String::with_capacity(collection.len() + document_id.len() + field.len() + 2);
        push_escaped(&mut key, collection);
        key.push(SEPARATOR);
        push_escaped(&mut key, document_id);
        key.push(SEPARATOR);
        push_escaped(&mut key, field);
        Self(key)
    }

    pub fn for_target(target: &FieldTarget) -> Self {
        Self::of(&target.collection, &target.document_id, &target.field)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&FieldTarget> for ChangeKey {
    fn from(target: &FieldTarget) -> Self {
        Self::for_target(target)
    }
}

impl std::fmt::Display for ChangeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn push_escaped(out: &mut String, segment: &str) {
    for ch in segment.chars() {
        match ch {
            '%' => out.push_str("%25"),
            SEPARATOR => out.push_str("%2F"),
            other => out.push(other),
        }
    }
}
