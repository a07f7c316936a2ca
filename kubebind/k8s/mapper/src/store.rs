//! Read access to the external aggregate store, plus an in-process reference
//! implementation.

use crate::{keys, signature::MetaIdentifier};
use ahash::AHashMap as HashMap;
use anyhow::Result;
use kubebind_core::{MapAction, MapResult, MappedResource};
use parking_lot::RwLock;
use tracing::debug;

/// The external keyed store, as visible to the engine.
///
/// The engine only reads; it returns mutated aggregates to the caller, who
/// persists them. Callers must serialize read-modify-write cycles per key;
/// the engine assumes single-writer-per-key semantics and does not enforce
/// them. Failures propagate as errors with no internal retry.
pub trait Store {
    /// All keys currently in the store; may span namespaces.
    fn list_keys(&self) -> Result<Vec<String>>;

    /// The serialized aggregate stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;
}

/// A store key scoped to one namespace, with its decoded signature.
#[derive(Clone, Debug)]
pub(crate) struct Candidate {
    /// The opaque store key, usable with [`Store::get`].
    pub key: String,
    /// The key's decoded text; candidates are ordered by it.
    decoded: String,
    pub id: MetaIdentifier,
}

/// Enumerates the aggregates in `namespace`.
///
/// Candidates are ordered lexicographically by decoded key so that
/// first-match-wins is deterministic across calls. Keys that fail to decode
/// are dropped here; a corrupt key must not block the rest.
pub(crate) fn candidates(store: &impl Store, namespace: &str) -> Result<Vec<Candidate>> {
    let mut scoped = Vec::new();
    for key in store.list_keys()? {
        let decoded = match keys::decode_raw(&key) {
            Some(decoded) => decoded,
            None => {
                debug!(%key, "skipping undecodable key");
                continue;
            }
        };
        let (ns, id) = keys::decode(&key);
        if ns != namespace {
            continue;
        }
        scoped.push(Candidate { key, decoded, id });
    }
    scoped.sort_by(|a, b| a.decoded.cmp(&b.decoded));
    Ok(scoped)
}

/// Fetches and decodes the aggregate under `key`.
///
/// A missing or undecodable entry is recovered as `None` so the caller can
/// keep scanning; store I/O failures propagate.
pub(crate) fn fetch(store: &impl Store, key: &str) -> Result<Option<MappedResource>> {
    let raw = match store.get(key)? {
        Some(raw) => raw,
        None => {
            debug!(%key, "aggregate missing from store");
            return Ok(None);
        }
    };
    match serde_json::from_str(&raw) {
        Ok(aggregate) => Ok(Some(aggregate)),
        Err(error) => {
            debug!(%key, %error, "skipping malformed aggregate");
            Ok(None)
        }
    }
}

/// In-process [`Store`] used by tests and single-process embeddings.
///
/// Writes go through [`MemoryStore::commit`], which persists a returned
/// [`MapResult`] under the key re-derived from the mutated aggregate's
/// signature.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

// === impl MemoryStore ===

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists an aggregate under its derived key; returns that key.
    pub fn insert(&self, resource: &MappedResource) -> Result<String> {
        let key = keys::encode(&resource.namespace, &MetaIdentifier::of(resource));
        let json = serde_json::to_string(resource)?;
        self.entries.write().insert(key.clone(), json);
        Ok(key)
    }

    pub fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Applies a result returned by the mapper: the prior entry (if any) is
    /// removed, and unless the aggregate dissolved, the mutated value is
    /// re-inserted under its re-derived key.
    pub fn commit(&self, result: &MapResult) -> Result<()> {
        if !result.is_mapped {
            return Ok(());
        }
        if let Some(key) = &result.key {
            self.remove(key);
        }
        if result.action == Some(MapAction::Deleted) {
            return Ok(());
        }
        if let Some(resource) = &result.mapped_resource {
            self.insert(resource)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }
}
