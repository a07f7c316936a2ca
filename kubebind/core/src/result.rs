use crate::mapped::MappedResource;

/// What the caller must do with the returned aggregate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MapAction {
    /// A new aggregate was created; persist it under its derived key.
    Added,
    /// An existing aggregate was mutated; re-persist it (its key changes with
    /// its signature).
    Updated,
    /// The aggregate's last member was removed; delete its store entry.
    Deleted,
}

/// The engine's sole output.
///
/// A non-mapped result (`is_mapped == false`, no payload) signals that the
/// event had nothing to apply to, e.g. a delete for a resource absent from
/// every aggregate. `message` is non-empty whenever `is_mapped` is set.
#[derive(Clone, Debug, Default)]
pub struct MapResult {
    pub action: Option<MapAction>,
    /// The store key of the matched aggregate; absent for newly created
    /// aggregates and non-mapped results.
    pub key: Option<String>,
    pub is_mapped: bool,
    pub common_label: Option<String>,
    pub mapped_resource: Option<MappedResource>,
    /// Human-readable audit string; carries no machine-checked contract.
    pub message: String,
}

// === impl MapResult ===

impl MapResult {
    /// The zero result: nothing to apply.
    pub fn unmapped() -> Self {
        Self::default()
    }
}
