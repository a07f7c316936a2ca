use crate::{signature, signature::MetaIdentifier, store, MapError, Mapper, Store};
use kubebind_core::{EventType, MapResult, Resource, ResourceEvent};
use kubebind_k8s_api::{labels::Selector, Service};
use tracing::{instrument, trace};

impl<S: Store> Mapper<S> {
    #[instrument(skip(self, event), fields(ns = %event.namespace, name = %event.name))]
    pub(crate) fn map_service(&self, event: &ResourceEvent) -> Result<MapResult, MapError> {
        let service = match &event.resource {
            Some(Resource::Service(service)) => Some(service),
            Some(_) => return Err(MapError::KindMismatch { kind: event.kind }),
            None => None,
        };

        if let Some(service) = service {
            let selector = signature::service_selector(service);
            for candidate in store::candidates(self.store(), &event.namespace)? {
                let criterion = match match_basis(&candidate.id, &selector) {
                    Some(criterion) => criterion,
                    None => {
                        trace!(key = %candidate.key, "no match");
                        continue;
                    }
                };
                if let Some(result) = self.join(&candidate, service, criterion)? {
                    return Ok(result);
                }
            }
            return Ok(self.create(&event.namespace, service));
        }

        if event.event_type == EventType::Deleted {
            return self.delete_member::<Service>(&event.namespace, &event.name);
        }

        Ok(MapResult::unmapped())
    }
}

/// Service predicates, in priority order: exact sibling-service selector,
/// deployment selector subset, replica-set selector subset, pod label subset.
/// A selector-less service matches nothing and seeds its own aggregate.
fn match_basis(id: &MetaIdentifier, selector: &Selector) -> Option<&'static str> {
    if selector.is_empty() {
        return None;
    }
    if id
        .services
        .match_labels
        .iter()
        .any(|svc| !svc.is_empty() && svc.matches_exactly(selector.as_ref()))
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
        .any(|rs| !rs.match_labels.is_empty() && rs.match_labels.matches(selector.as_ref()))
    {
        return Some("replica set");
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
