//! Shared mutation and cascade-delete rules, applied uniformly by every
//! per-kind matcher.

use kubebind_core::{KubeMembers, MappedResource, ResourceKind};
use kubebind_k8s_api::{Deployment, Ingress, Pod, ReplicaSet, ResourceExt, Service};

/// One of the five member collections of an aggregate.
pub(crate) trait Member: Clone {
    const KIND: ResourceKind;

    fn member_name(&self) -> String;
    fn collection_mut(kube: &mut KubeMembers) -> &mut Vec<Self>;
}

impl Member for Deployment {
    const KIND: ResourceKind = ResourceKind::Deployment;

    fn member_name(&self) -> String {
        self.name_any()
    }

    fn collection_mut(kube: &mut KubeMembers) -> &mut Vec<Self> {
        &mut kube.deployments
    }
}

impl Member for ReplicaSet {
    const KIND: ResourceKind = ResourceKind::ReplicaSet;

    fn member_name(&self) -> String {
        self.name_any()
    }

    fn collection_mut(kube: &mut KubeMembers) -> &mut Vec<Self> {
        &mut kube.replica_sets
    }
}

impl Member for Service {
    const KIND: ResourceKind = ResourceKind::Service;

    fn member_name(&self) -> String {
        self.name_any()
    }

    fn collection_mut(kube: &mut KubeMembers) -> &mut Vec<Self> {
        &mut kube.services
    }
}

impl Member for Pod {
    const KIND: ResourceKind = ResourceKind::Pod;

    fn member_name(&self) -> String {
        self.name_any()
    }

    fn collection_mut(kube: &mut KubeMembers) -> &mut Vec<Self> {
        &mut kube.pods
    }
}

impl Member for Ingress {
    const KIND: ResourceKind = ResourceKind::Ingress;

    fn member_name(&self) -> String {
        self.name_any()
    }

    fn collection_mut(kube: &mut KubeMembers) -> &mut Vec<Self> {
        &mut kube.ingresses
    }
}

/// How an upsert changed the aggregate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Upsert {
    /// A member of the same kind and name existed and was replaced in place.
    Replaced,
    /// The member was appended to its kind's collection.
    Appended,
}

/// Folds `member` into an existing aggregate: replace in place when a member
/// of the same kind and name exists, append otherwise. An append that gives a
/// kind its first member reassigns the common label to that member's name.
pub(crate) fn upsert<M: Member>(aggregate: &mut MappedResource, member: M) -> Upsert {
    aggregate.current_type = M::KIND;
    let name = member.member_name();
    let collection = M::collection_mut(&mut aggregate.kube);
    if let Some(existing) = collection.iter_mut().find(|m| m.member_name() == name) {
        *existing = member;
        return Upsert::Replaced;
    }
    collection.push(member);
    if collection.len() == 1 {
        aggregate.common_label = name;
    }
    Upsert::Appended
}

/// A brand-new single-member aggregate, labeled after that member.
pub(crate) fn seed<M: Member>(namespace: &str, member: M) -> MappedResource {
    let name = member.member_name();
    let mut kube = KubeMembers::default();
    M::collection_mut(&mut kube).push(member);
    MappedResource {
        common_label: name,
        current_type: M::KIND,
        namespace: namespace.to_string(),
        kube,
    }
}

/// Removes the named member from its kind's collection. Returns false when
/// the aggregate holds no such member.
pub(crate) fn remove<M: Member>(aggregate: &mut MappedResource, name: &str) -> bool {
    let collection = M::collection_mut(&mut aggregate.kube);
    let before = collection.len();
    collection.retain(|m| m.member_name() != name);
    collection.len() != before
}

/// True when a removal left the aggregate with no members of any kind, i.e.
/// the aggregate dissolves rather than shrinks.
pub(crate) fn is_dissolved(aggregate: &MappedResource) -> bool {
    aggregate.kube.is_empty()
}
