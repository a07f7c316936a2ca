use crate::{signature, signature::MetaIdentifier, store, MapError, Mapper, Store};
use kubebind_core::{EventType, MapResult, Resource, ResourceEvent};
use kubebind_k8s_api::{labels::Selector, ReplicaSet, ResourceExt};
use std::collections::BTreeSet;
use tracing::{instrument, trace};

impl<S: Store> Mapper<S> {
    #[instrument(skip(self, event), fields(ns = %event.namespace, name = %event.name))]
    pub(crate) fn map_replica_set(&self, event: &ResourceEvent) -> Result<MapResult, MapError> {
        let replica_set = match &event.resource {
            Some(Resource::ReplicaSet(replica_set)) => Some(replica_set),
            Some(_) => return Err(MapError::KindMismatch { kind: event.kind }),
            None => None,
        };

        if let Some(replica_set) = replica_set {
            let selector = signature::replica_set_selector(replica_set);
            let owners = signature::owner_names(replica_set.owner_references());
            for candidate in store::candidates(self.store(), &event.namespace)? {
                let criterion = match match_basis(&candidate.id, &selector, &owners) {
                    Some(criterion) => criterion,
                    None => {
                        trace!(key = %candidate.key, "no match");
                        continue;
                    }
                };
                if let Some(result) = self.join(&candidate, replica_set, criterion)? {
                    return Ok(result);
                }
            }
            return Ok(self.create(&event.namespace, replica_set));
        }

        if event.event_type == EventType::Deleted {
            return self.delete_member::<ReplicaSet>(&event.namespace, &event.name);
        }

        Ok(MapResult::unmapped())
    }
}

/// Replica-set predicates, in priority order: service selector subset,
/// deployment selector subset, exact sibling replica-set selector, owner
/// reference against recorded deployment names, pod label subset. Empty
/// recorded selectors never match.
fn match_basis(
    id: &MetaIdentifier,
    selector: &Selector,
    owners: &BTreeSet<String>,
) -> Option<&'static str> {
    if id
        .services
        .match_labels
        .iter()
        .any(|svc| !svc.is_empty() && svc.matches(selector.as_ref()))
    {
        return Some("service");
    }
    if id
        .deployments
        .match_labels
        .iter()
        .any(|dep| !dep.is_empty() && dep.matches(selector.as_ref()))
    {
        return Some("deployment");
    }
    if id
        .replica_sets
        .iter()
        .any(|rs| !rs.match_labels.is_empty() && rs.match_labels.matches_exactly(selector.as_ref()))
    {
        return Some("replica set");
    }
    if id.deployments.names.iter().any(|dep| owners.contains(dep)) {
        return Some("deployment");
    }
    if id
        .pods
        .iter()
        .any(|pod| !pod.match_labels.is_empty() && pod.match_labels.matches(selector.as_ref()))
    {
        return Some("pod");
    }
    None
}
