//! Structural diff between two proposed data mappings
//!
//! Feeds the `currentChange.changes` record the state machine stages for
//! review. Equality is deep structural equality on JSON values, so nested
//! mappings compare by content rather than identity. Key order in the
//! output follows the new data for `added`/`updated` and the old data for
//! `removed`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A JSON object mapping field names to values.
pub type Fields = serde_json::Map<String, Value>;

/// Classified delta between two data mappings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Keys present in the new data but not the old.
    #[serde(default)]
    pub added: Fields,
    /// Keys present in both whose values differ, as `{from, to}` pairs.
    #[serde(default)]
    pub updated: Fields,
    /// Keys present in the old data but not the new.
    #[serde(default)]
    pub removed: Fields,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Compute the delta between a previously proposed mapping and a newly
/// submitted one. Absent inputs are treated as empty mappings. Pure
/// function, no side effects.
pub fn compute(old: Option<&Fields>, new: Option<&Fields>) -> ChangeSet {
    let empty = Fields::new();
    let old = old.unwrap_or(&empty);
    let new = new.unwrap_or(&empty);

    let mut changes = ChangeSet::default();

    for (key, value) in new {
        match old.get(key) {
            None => {
                changes.added.insert(key.clone(), value.clone());
            }
            Some(prev) if prev != value => {
                changes
                    .updated
                    .insert(key.clone(), json!({ "from": prev, "to": value }));
            }
            Some(_) => {}
        }
    }

    for (key, value) in old {
        if !new.contains_key(key) {
            changes.removed.insert(key.clone(), value.clone());
        }
    }

    changes
}
