use crate::{signature, store, MapError, Mapper, Store};
use kubebind_core::{EventType, MapResult, Resource, ResourceEvent};
use kubebind_k8s_api::Ingress;
use tracing::{instrument, trace};

impl<S: Store> Mapper<S> {
    /// Ingresses correlate by the service names their backends route to;
    /// they contribute nothing to the match signature themselves.
    #[instrument(skip(self, event), fields(ns = %event.namespace, name = %event.name))]
    pub(crate) fn map_ingress(&self, event: &ResourceEvent) -> Result<MapResult, MapError> {
        let ingress = match &event.resource {
            Some(Resource::Ingress(ingress)) => Some(ingress),
            Some(_) => return Err(MapError::KindMismatch { kind: event.kind }),
            None => None,
        };

        if let Some(ingress) = ingress {
            let backends = signature::ingress_backends(ingress);
            for candidate in store::candidates(self.store(), &event.namespace)? {
                if candidate.id.services.names.intersection(&backends).next().is_none() {
                    trace!(key = %candidate.key, "no match");
                    continue;
                }
                if let Some(result) = self.join(&candidate, ingress, "service")? {
                    return Ok(result);
                }
            }
            return Ok(self.create(&event.namespace, ingress));
        }

        if event.event_type == EventType::Deleted {
            return self.delete_member::<Ingress>(&event.namespace, &event.name);
        }

        Ok(MapResult::unmapped())
    }
}
