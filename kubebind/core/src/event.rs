use kubebind_k8s_api::{Deployment, Ingress, Pod, ReplicaSet, ResourceExt, Service};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The kind of change an event describes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

/// The resource kinds the correlator indexes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Deployment,
    ReplicaSet,
    Service,
    Pod,
    Ingress,
}

/// Returned when a kind tag from the event source is not one the correlator
/// handles.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
#[error("unrecognized resource kind: {0}")]
pub struct UnknownKind(pub String);

/// A full resource payload, present on added/modified events.
#[derive(Clone, Debug)]
pub enum Resource {
    Deployment(Deployment),
    ReplicaSet(ReplicaSet),
    Service(Service),
    Pod(Pod),
    Ingress(Ingress),
}

/// One observed change, as delivered by the watch layer.
///
/// The payload is present for added/modified events and absent for deletes,
/// which carry only the kind, namespace, and name. Events are read-only to
/// the engine.
#[derive(Clone, Debug)]
pub struct ResourceEvent {
    pub event_type: EventType,
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub resource: Option<Resource>,
}

// === impl ResourceKind ===

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::ReplicaSet => "replicaset",
            Self::Service => "service",
            Self::Pod => "pod",
            Self::Ingress => "ingress",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deployment" => Ok(Self::Deployment),
            "replicaset" => Ok(Self::ReplicaSet),
            "service" => Ok(Self::Service),
            "pod" => Ok(Self::Pod),
            "ingress" => Ok(Self::Ingress),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

// === impl Resource ===

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Deployment(_) => ResourceKind::Deployment,
            Self::ReplicaSet(_) => ResourceKind::ReplicaSet,
            Self::Service(_) => ResourceKind::Service,
            Self::Pod(_) => ResourceKind::Pod,
            Self::Ingress(_) => ResourceKind::Ingress,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Deployment(d) => d.name_any(),
            Self::ReplicaSet(rs) => rs.name_any(),
            Self::Service(s) => s.name_any(),
            Self::Pod(p) => p.name_any(),
            Self::Ingress(i) => i.name_any(),
        }
    }

    pub fn namespace(&self) -> String {
        match self {
            Self::Deployment(d) => d.namespace(),
            Self::ReplicaSet(rs) => rs.namespace(),
            Self::Service(s) => s.namespace(),
            Self::Pod(p) => p.namespace(),
            Self::Ingress(i) => i.namespace(),
        }
        .unwrap_or_default()
    }
}

impl From<Deployment> for Resource {
    fn from(d: Deployment) -> Self {
        Self::Deployment(d)
    }
}

impl From<ReplicaSet> for Resource {
    fn from(rs: ReplicaSet) -> Self {
        Self::ReplicaSet(rs)
    }
}

impl From<Service> for Resource {
    fn from(s: Service) -> Self {
        Self::Service(s)
    }
}

impl From<Pod> for Resource {
    fn from(p: Pod) -> Self {
        Self::Pod(p)
    }
}

impl From<Ingress> for Resource {
    fn from(i: Ingress) -> Self {
        Self::Ingress(i)
    }
}

// === impl ResourceEvent ===

impl ResourceEvent {
    /// An added event carrying its full payload.
    pub fn added(resource: impl Into<Resource>) -> Self {
        Self::applied(EventType::Added, resource)
    }

    /// A modified event carrying its full payload.
    pub fn modified(resource: impl Into<Resource>) -> Self {
        Self::applied(EventType::Modified, resource)
    }

    /// A deleted event; deletes carry no payload.
    pub fn deleted(kind: ResourceKind, namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            event_type: EventType::Deleted,
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            resource: None,
        }
    }

    fn applied(event_type: EventType, resource: impl Into<Resource>) -> Self {
        let resource = resource.into();
        Self {
            event_type,
            kind: resource.kind(),
            namespace: resource.namespace(),
            name: resource.name(),
            resource: Some(resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            ResourceKind::Deployment,
            ResourceKind::ReplicaSet,
            ResourceKind::Service,
            ResourceKind::Pod,
            ResourceKind::Ingress,
        ] {
            assert_eq!(kind.as_str().parse::<ResourceKind>(), Ok(kind));
        }
        assert_eq!(
            "daemonset".parse::<ResourceKind>(),
            Err(UnknownKind("daemonset".to_string()))
        );
    }
}
