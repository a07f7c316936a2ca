use crate::{signature, signature::MetaIdentifier, store, MapError, Mapper, Store};
use kubebind_core::{EventType, MapResult, Resource, ResourceEvent};
use kubebind_k8s_api::{labels::Selector, Pod, ResourceExt};
use std::collections::BTreeSet;
use tracing::{instrument, trace};

impl<S: Store> Mapper<S> {
    #[instrument(skip(self, event), fields(ns = %event.namespace, name = %event.name))]
    pub(crate) fn map_pod(&self, event: &ResourceEvent) -> Result<MapResult, MapError> {
        let pod = match &event.resource {
            Some(Resource::Pod(pod)) => Some(pod),
            Some(_) => return Err(MapError::KindMismatch { kind: event.kind }),
            None => None,
        };

        if let Some(pod) = pod {
            let labels = signature::pod_labels(pod);
            let owners = signature::owner_names(pod.owner_references());
            for candidate in store::candidates(self.store(), &event.namespace)? {
                let criterion = match match_basis(&candidate.id, &labels, &owners) {
                    Some(criterion) => criterion,
                    None => {
                        trace!(key = %candidate.key, "no match");
                        continue;
                    }
                };
                if let Some(result) = self.join(&candidate, pod, criterion)? {
                    return Ok(result);
                }
            }
            return Ok(self.create(&event.namespace, pod));
        }

        if event.event_type == EventType::Deleted {
            return self.delete_member::<Pod>(&event.namespace, &event.name);
        }

        Ok(MapResult::unmapped())
    }
}

/// Pod predicates, in priority order: service selector subset, deployment
/// selector subset, replica-set selector subset, owner reference against
/// recorded replica-set names, sibling-pod label subset. The pod's labels are
/// the incoming side; each candidate selector must be fully satisfied by
/// them. Empty recorded selectors never match.
fn match_basis(
    id: &MetaIdentifier,
    labels: &Selector,
    owners: &BTreeSet<String>,
) -> Option<&'static str> {
    if id
        .services
        .match_labels
        .iter()
        .any(|svc| !svc.is_empty() && svc.matches(labels.as_ref()))
    {
        return Some("service");
    }
    if id
        .deployments
        .match_labels
        .iter()
        .any(|dep| !dep.is_empty() && dep.matches(labels.as_ref()))
    {
        return Some("deployment");
    }
    if id
        .replica_sets
        .iter()
        .any(|rs| !rs.match_labels.is_empty() && rs.match_labels.matches(labels.as_ref()))
    {
        return Some("replica set");
    }
    if id.replica_sets.iter().any(|rs| owners.contains(&rs.name)) {
        return Some("replica set");
    }
    if id
        .pods
        .iter()
        .any(|pod| !pod.match_labels.is_empty() && pod.match_labels.matches(labels.as_ref()))
    {
        return Some("pod");
    }
    None
}
