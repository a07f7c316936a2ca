//! Match signatures: the compact per-aggregate summary used to test
//! candidacy without deserializing full member payloads.

use kubebind_core::{MappedResource, ResourceKind};
use kubebind_k8s_api::{
    labels::Selector, Deployment, Ingress, OwnerReference, Pod, ReplicaSet, ResourceExt, Service,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Accumulated identities for services or deployments: the member names plus
/// each member's recorded selector.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KindIdentifier {
    pub names: BTreeSet<String>,
    pub match_labels: Vec<Selector>,
}

/// One replica set's identity: its name, selector, and the names of the
/// parents that created it.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplicaSetIdentifier {
    pub name: String,
    pub match_labels: Selector,
    pub owner_references: BTreeSet<String>,
}

/// One pod's identity: its label map. Pod names are not recorded; pod deletes
/// resolve against the full aggregate instead.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PodIdentifier {
    pub match_labels: Selector,
}

/// The full match signature of one aggregate, serialized as the value half of
/// its store key.
///
/// Invariant: always re-derived from the aggregate's member list via
/// [`MetaIdentifier::of`] after any mutation; a stale signature causes false
/// or missed matches.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetaIdentifier {
    pub services: KindIdentifier,
    pub deployments: KindIdentifier,
    pub replica_sets: Vec<ReplicaSetIdentifier>,
    pub pods: Vec<PodIdentifier>,
}

// === impl MetaIdentifier ===

impl MetaIdentifier {
    /// Derives the signature from an aggregate's current member list.
    pub fn of(resource: &MappedResource) -> Self {
        let mut id = Self::default();
        for svc in &resource.kube.services {
            id.services.names.insert(svc.name_any());
            id.services.match_labels.push(service_selector(svc));
        }
        for dep in &resource.kube.deployments {
            id.deployments.names.insert(dep.name_any());
            id.deployments.match_labels.push(deployment_selector(dep));
        }
        for rs in &resource.kube.replica_sets {
            id.replica_sets.push(ReplicaSetIdentifier {
                name: rs.name_any(),
                match_labels: replica_set_selector(rs),
                owner_references: owner_names(rs.owner_references()),
            });
        }
        for pod in &resource.kube.pods {
            id.pods.push(PodIdentifier {
                match_labels: pod_labels(pod),
            });
        }
        id
    }

    /// Whether an aggregate with this signature may hold a member of `kind`
    /// named `name`. Kinds that record no names in the signature (pods,
    /// ingresses) cannot be excluded here and must be resolved against the
    /// full aggregate.
    pub fn may_contain(&self, kind: ResourceKind, name: &str) -> bool {
        match kind {
            ResourceKind::Service => self.services.names.contains(name),
            ResourceKind::Deployment => self.deployments.names.contains(name),
            ResourceKind::ReplicaSet => self.replica_sets.iter().any(|rs| rs.name == name),
            ResourceKind::Pod | ResourceKind::Ingress => true,
        }
    }
}

// === selector extraction ===

pub(crate) fn service_selector(svc: &Service) -> Selector {
    svc.spec
        .as_ref()
        .and_then(|spec| spec.selector.clone())
        .unwrap_or_default()
        .into()
}

pub(crate) fn deployment_selector(dep: &Deployment) -> Selector {
    dep.spec
        .as_ref()
        .and_then(|spec| spec.selector.match_labels.clone())
        .unwrap_or_default()
        .into()
}

pub(crate) fn replica_set_selector(rs: &ReplicaSet) -> Selector {
    rs.spec
        .as_ref()
        .and_then(|spec| spec.selector.match_labels.clone())
        .unwrap_or_default()
        .into()
}

pub(crate) fn pod_labels(pod: &Pod) -> Selector {
    pod.labels().clone().into()
}

pub(crate) fn owner_names(refs: &[OwnerReference]) -> BTreeSet<String> {
    refs.iter().map(|r| r.name.clone()).collect()
}

/// All service names an ingress routes to, across every rule path and the
/// default backend.
pub(crate) fn ingress_backends(ingress: &Ingress) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    if let Some(spec) = &ingress.spec {
        if let Some(backend) = spec.default_backend.as_ref().and_then(|b| b.service.as_ref()) {
            names.insert(backend.name.clone());
        }
        for rule in spec.rules.iter().flatten() {
            for path in rule.http.iter().flat_map(|http| http.paths.iter()) {
                if let Some(backend) = &path.backend.service {
                    names.insert(backend.name.clone());
                }
            }
        }
    }
    names
}
