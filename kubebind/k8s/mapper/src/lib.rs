//! kubebind correlation engine
//!
//! The mapper ingests add/update/delete events for cluster resources and
//! groups logically related resources — a Service, the Deployment it fronts,
//! the ReplicaSets that Deployment owns, the Pods those ReplicaSets own, and
//! the Ingresses routing to the Service — into aggregates keyed by a common
//! label, persisted in an external keyed store:
//!
//! ```text
//! [ Ingress ] -> [ Service ] <- [ Deployment ] <- [ ReplicaSet ] <- [ Pod ]
//! ```
//!
//! Each aggregate is summarized by a match signature embedded in its store
//! key, so candidacy is tested without deserializing member payloads. An
//! incoming resource is tried against each namespace-scoped candidate with
//! per-kind predicates in fixed priority order; the first match wins, under a
//! documented lexicographic candidate ordering. Matching never mutates the
//! store: every call returns a [`MapResult`] holding the newly formed
//! aggregate value, and the caller persists it (or removes the key when the
//! aggregate dissolved).
//!
//! The engine is synchronous and stateless between calls. Concurrent use is
//! safe only if the caller serializes read-modify-write cycles per store key.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod aggregate;
mod deployment;
mod ingress;
pub mod keys;
mod pod;
mod replica_set;
mod service;
mod signature;
mod store;

#[cfg(test)]
mod tests;

pub use self::{
    signature::{KindIdentifier, MetaIdentifier, PodIdentifier, ReplicaSetIdentifier},
    store::{MemoryStore, Store},
};

use self::{
    aggregate::{Member, Upsert},
    store::Candidate,
};
use kubebind_core::{MapAction, MapResult, MappedResource, ResourceEvent, ResourceKind};
use tracing::debug;

/// Dispatches incoming events to the per-kind matchers.
pub struct Mapper<S> {
    store: S,
}

/// Errors surfaced to the caller. "No match" outcomes are never errors; they
/// are represented as non-mapped results.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The event's kind tag disagrees with the payload it carries.
    #[error("event tagged {kind} carries a payload of another kind")]
    KindMismatch { kind: ResourceKind },

    /// The store failed on list or get; propagated without retry.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

// === impl Mapper ===

impl<S> Mapper<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: Store> Mapper<S> {
    /// Maps one event onto the namespace's aggregates.
    ///
    /// Returns the mutation the caller must persist: a new aggregate, an
    /// updated one, a dissolved one, or a non-mapped zero result when the
    /// event had nothing to apply to.
    pub fn map(&self, event: &ResourceEvent) -> Result<MapResult, MapError> {
        match event.kind {
            ResourceKind::Deployment => self.map_deployment(event),
            ResourceKind::ReplicaSet => self.map_replica_set(event),
            ResourceKind::Service => self.map_service(event),
            ResourceKind::Pod => self.map_pod(event),
            ResourceKind::Ingress => self.map_ingress(event),
        }
    }

    /// Folds `member` into the candidate's aggregate.
    ///
    /// `Ok(None)` means the aggregate could not be fetched or decoded; the
    /// caller keeps scanning remaining candidates.
    fn join<M: Member>(
        &self,
        candidate: &Candidate,
        member: &M,
        criterion: &'static str,
    ) -> Result<Option<MapResult>, MapError> {
        let mut aggregate = match store::fetch(&self.store, &candidate.key)? {
            Some(aggregate) => aggregate,
            None => return Ok(None),
        };

        let name = member.member_name();
        let verb = match aggregate::upsert(&mut aggregate, member.clone()) {
            Upsert::Replaced => "updated in",
            Upsert::Appended => "added to",
        };
        let message = format!(
            "{} {} is {} common label {} after matching with {}",
            M::KIND,
            name,
            verb,
            aggregate.common_label,
            criterion
        );
        debug!(%message);

        Ok(Some(MapResult {
            action: Some(MapAction::Updated),
            key: Some(candidate.key.clone()),
            is_mapped: true,
            common_label: Some(aggregate.common_label.clone()),
            mapped_resource: Some(aggregate),
            message,
        }))
    }

    /// No candidate matched: a new single-member aggregate.
    fn create<M: Member>(&self, namespace: &str, member: &M) -> MapResult {
        let aggregate = aggregate::seed(namespace, member.clone());
        let message = format!(
            "new {} {} is created with common label {}",
            M::KIND,
            member.member_name(),
            aggregate.common_label
        );
        debug!(%message);

        MapResult {
            action: Some(MapAction::Added),
            key: None,
            is_mapped: true,
            common_label: Some(aggregate.common_label.clone()),
            mapped_resource: Some(aggregate),
            message,
        }
    }

    /// Shared DELETED path: find the aggregate holding the named member,
    /// remove it, and decide dissolve-vs-shrink from the remaining members.
    fn delete_member<M: Member>(&self, namespace: &str, name: &str) -> Result<MapResult, MapError> {
        for candidate in store::candidates(&self.store, namespace)? {
            if !candidate.id.may_contain(M::KIND, name) {
                continue;
            }
            let mut aggregate = match store::fetch(&self.store, &candidate.key)? {
                Some(aggregate) => aggregate,
                None => continue,
            };
            if !aggregate::remove::<M>(&mut aggregate, name) {
                continue;
            }
            return Ok(Self::removal_result::<M>(candidate.key, name, aggregate));
        }

        debug!(kind = %M::KIND, %name, "delete matched no aggregate");
        Ok(MapResult::unmapped())
    }

    fn removal_result<M: Member>(
        key: String,
        name: &str,
        aggregate: MappedResource,
    ) -> MapResult {
        let action = if aggregate::is_dissolved(&aggregate) {
            MapAction::Deleted
        } else {
            MapAction::Updated
        };
        let message = format!(
            "{} {} is deleted from common label {}",
            M::KIND,
            name,
            aggregate.common_label
        );
        debug!(%message, ?action);

        MapResult {
            action: Some(action),
            key: Some(key),
            is_mapped: true,
            common_label: Some(aggregate.common_label.clone()),
            mapped_resource: Some(aggregate),
            message,
        }
    }
}
