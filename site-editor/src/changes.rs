//! Pending change store - uncommitted text edits keyed by change key.

use std::collections::BTreeMap;

use shared_types::PendingChange;
use tracing::debug;

use crate::change_key::ChangeKey;

/// At most one entry per key; a later record replaces the earlier one.
#[derive(Debug, Default, Clone)]
pub struct PendingChangeStore {
    entries: BTreeMap<ChangeKey, PendingChange>,
}

impl PendingChangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_change(&mut self, key: ChangeKey, change: PendingChange) {
        debug!(key = %key, "recording pending change");
        self.entries.insert(key, change);
    }

    pub fn clear_change(&mut self, key: &ChangeKey) {
        if self.entries.remove(key).is_some() {
            debug!(key = %key, "cleared pending change");
        }
    }

    pub fn has_change(&self, key: &ChangeKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &ChangeKey) -> Option<&PendingChange> {
        self.entries.get(key)
    }

    /// Proposed value if an edit is pending, otherwise `fallback`
    /// (the field's last published value).
    pub fn current_value_for(&self, key: &ChangeKey, fallback: &str) -> String {
        self.entries
            .get(key)
            .map(|change| change.proposed_value.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every entry in key order. Does not mutate the store.
    pub fn drain_all(&self) -> Vec<(ChangeKey, PendingChange)> {
        self.entries
            .iter()
            .map(|(key, change)| (key.clone(), change.clone()))
            .collect()
    }

    /// Remove `key` only while it still proposes `proposed_value`.
    ///
    /// Used after a publish so that an edit made to the same field while the
    /// publish was in flight stays pending.
    pub fn clear_if_unchanged(&mut self, key: &ChangeKey, proposed_value: &str) -> bool {
        let unchanged = self
            .entries
            .get(key)
            .is_some_and(|change| change.proposed_value == proposed_value);
        if unchanged {
            self.entries.remove(key);
        }
        unchanged
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
