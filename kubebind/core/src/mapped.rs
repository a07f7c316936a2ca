use crate::event::ResourceKind;
use kubebind_k8s_api::{Deployment, Ingress, Pod, ReplicaSet, Service};
use serde::{Deserialize, Serialize};

/// The member collections of one aggregate, per kind.
///
/// Collections are ordered; members are unique by name within each
/// collection.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct KubeMembers {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deployments: Vec<Deployment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replica_sets: Vec<ReplicaSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pods: Vec<Pod>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ingresses: Vec<Ingress>,
}

/// The persisted unit of correlation: a group of logically related resources
/// sharing one common label.
///
/// The store key's match signature is derived from the member list and must
/// be regenerated after any mutation; the caller persists the returned value
/// under that regenerated key.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MappedResource {
    /// The human-facing identity of the group, assigned from its first
    /// member's name and reassigned when a later kind gains its first member.
    pub common_label: String,
    /// The kind of the most recently processed member.
    pub current_type: ResourceKind,
    pub namespace: String,
    pub kube: KubeMembers,
}

// === impl KubeMembers ===

impl KubeMembers {
    /// True when no collection holds any member.
    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty()
            && self.replica_sets.is_empty()
            && self.services.is_empty()
            && self.pods.is_empty()
            && self.ingresses.is_empty()
    }
}
