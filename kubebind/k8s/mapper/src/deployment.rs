use crate::{signature, signature::MetaIdentifier, store, MapError, Mapper, Store};
use kubebind_core::{EventType, MapResult, Resource, ResourceEvent};
use kubebind_k8s_api::{labels::Selector, Deployment, ResourceExt};
use tracing::{instrument, trace};

impl<S: Store> Mapper<S> {
    #[instrument(skip(self, event), fields(ns = %event.namespace, name = %event.name))]
    pub(crate) fn map_deployment(&self, event: &ResourceEvent) -> Result<MapResult, MapError> {
        let deployment = match &event.resource {
            Some(Resource::Deployment(deployment)) => Some(deployment),
            Some(_) => return Err(MapError::KindMismatch { kind: event.kind }),
            None => None,
        };

        if let Some(deployment) = deployment {
            let selector = signature::deployment_selector(deployment);
            let name = deployment.name_any();
            for candidate in store::candidates(self.store(), &event.namespace)? {
                let criterion = match match_basis(&candidate.id, &selector, &name) {
                    Some(criterion) => criterion,
                    None => {
                        trace!(key = %candidate.key, "no match");
                        continue;
                    }
                };
                if let Some(result) = self.join(&candidate, deployment, criterion)? {
                    return Ok(result);
                }
            }
            return Ok(self.create(&event.namespace, deployment));
        }

        if event.event_type == EventType::Deleted {
            return self.delete_member::<Deployment>(&event.namespace, &event.name);
        }

        Ok(MapResult::unmapped())
    }
}

/// Deployment predicates, in priority order: exact service selector, exact
/// sibling-deployment selector, replica-set owner reference, pod label
/// subset. Empty recorded selectors never match.
fn match_basis(id: &MetaIdentifier, selector: &Selector, name: &str) -> Option<&'static str> {
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
        .any(|dep| !dep.is_empty() && dep.matches_exactly(selector.as_ref()))
    {
        return Some("deployment");
    }
    if id
        .replica_sets
        .iter()
        .any(|rs| rs.owner_references.contains(name))
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
