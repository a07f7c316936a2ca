use crate::{keys, signature::MetaIdentifier, MapError, Mapper, MemoryStore, Store};
use anyhow::Result;
use kubebind_core::{
    KubeMembers, MapAction, MapResult, MappedResource, ResourceEvent, ResourceKind,
};
use kubebind_k8s_api::{
    api::{
        apps::v1::{DeploymentSpec, ReplicaSetSpec},
        core::v1::ServiceSpec,
        networking::v1::{
            HTTPIngressPath, HTTPIngressRuleValue, IngressBackend, IngressRule,
            IngressServiceBackend, IngressSpec,
        },
    },
    labels::Selector,
    Deployment, Ingress, LabelSelector, ObjectMeta, OwnerReference, Pod, ReplicaSet, Service,
};
use maplit::btreemap;

struct TestConfig {
    mapper: Mapper<MemoryStore>,
    _tracing: tracing::subscriber::DefaultGuard,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            mapper: Mapper::new(MemoryStore::new()),
            _tracing: init_tracing(),
        }
    }
}

impl TestConfig {
    /// Maps an event and persists the result, as the surrounding service
    /// would.
    fn apply(&self, event: ResourceEvent) -> MapResult {
        let result = self.mapper.map(&event).expect("mapping failed");
        self.mapper.store().commit(&result).expect("commit failed");
        result
    }

    fn store(&self) -> &MemoryStore {
        self.mapper.store()
    }
}

fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .finish(),
    )
}

fn meta(ns: impl ToString, name: impl ToString) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(ns.to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

fn labels(
    pairs: impl IntoIterator<Item = (&'static str, &'static str)>,
) -> std::collections::BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn mk_service(
    ns: impl ToString,
    name: impl ToString,
    selector: impl IntoIterator<Item = (&'static str, &'static str)>,
) -> Service {
    Service {
        metadata: meta(ns, name),
        spec: Some(ServiceSpec {
            selector: Some(labels(selector)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mk_deployment(
    ns: impl ToString,
    name: impl ToString,
    selector: impl IntoIterator<Item = (&'static str, &'static str)>,
) -> Deployment {
    Deployment {
        metadata: meta(ns, name),
        spec: Some(DeploymentSpec {
            selector: LabelSelector {
                match_labels: Some(labels(selector)),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mk_replica_set(
    ns: impl ToString,
    name: impl ToString,
    selector: impl IntoIterator<Item = (&'static str, &'static str)>,
    owner: Option<&str>,
) -> ReplicaSet {
    let mut metadata = meta(ns, name);
    metadata.owner_references = owner.map(|owner| {
        vec![OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: owner.to_string(),
            uid: "00000000-0000-0000-0000-000000000000".to_string(),
            ..Default::default()
        }]
    });
    ReplicaSet {
        metadata,
        spec: Some(ReplicaSetSpec {
            selector: LabelSelector {
                match_labels: Some(labels(selector)),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mk_pod(
    ns: impl ToString,
    name: impl ToString,
    pod_labels: impl IntoIterator<Item = (&'static str, &'static str)>,
    owner: Option<&str>,
) -> Pod {
    let mut metadata = meta(ns, name);
    metadata.labels = Some(labels(pod_labels));
    metadata.owner_references = owner.map(|owner| {
        vec![OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "ReplicaSet".to_string(),
            name: owner.to_string(),
            uid: "00000000-0000-0000-0000-000000000000".to_string(),
            ..Default::default()
        }]
    });
    Pod {
        metadata,
        ..Default::default()
    }
}

fn mk_ingress(ns: impl ToString, name: impl ToString, backend: &str) -> Ingress {
    Ingress {
        metadata: meta(ns, name),
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: None,
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: backend.to_string(),
                                port: None,
                            }),
                            resource: None,
                        },
                        path: None,
                        path_type: "Prefix".to_string(),
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn members(result: &MapResult) -> &KubeMembers {
    &result
        .mapped_resource
        .as_ref()
        .expect("result must carry an aggregate")
        .kube
}

#[test]
fn creation_on_first_sight() {
    let test = TestConfig::default();

    let result = test.apply(ResourceEvent::added(mk_deployment(
        "ns-0",
        "web",
        [("app", "web")],
    )));

    assert_eq!(result.action, Some(MapAction::Added));
    assert!(result.is_mapped);
    assert_eq!(result.common_label.as_deref(), Some("web"));
    assert_eq!(members(&result).deployments.len(), 1);
    assert_eq!(test.store().len(), 1);

    let aggregate = result.mapped_resource.unwrap();
    assert_eq!(aggregate.current_type, ResourceKind::Deployment);
    assert_eq!(aggregate.namespace, "ns-0");
}

#[test]
fn service_selector_groups_deployment() {
    let test = TestConfig::default();

    test.apply(ResourceEvent::added(mk_service(
        "ns-0",
        "web-svc",
        [("app", "web")],
    )));
    let result = test.apply(ResourceEvent::added(mk_deployment(
        "ns-0",
        "web",
        [("app", "web")],
    )));

    assert_eq!(result.action, Some(MapAction::Updated));
    // The first deployment member takes over the common label.
    assert_eq!(result.common_label.as_deref(), Some("web"));
    assert_eq!(members(&result).services.len(), 1);
    assert_eq!(members(&result).deployments.len(), 1);
    // Both resources live under one aggregate, not two.
    assert_eq!(test.store().len(), 1);
}

#[test]
fn pod_subset_match_ignores_extra_labels() {
    let test = TestConfig::default();

    test.apply(ResourceEvent::added(mk_service(
        "ns-0",
        "web-svc",
        [("app", "web"), ("tier", "frontend")],
    )));

    // Extra pod labels beyond the recorded selector are ignored.
    let result = test.apply(ResourceEvent::added(mk_pod(
        "ns-0",
        "web-pod-0",
        [("app", "web"), ("tier", "frontend"), ("extra", "z")],
        None,
    )));
    assert_eq!(result.action, Some(MapAction::Updated));
    assert_eq!(members(&result).pods.len(), 1);

    // A pod missing one of the recorded selector's keys must not join.
    let result = test.apply(ResourceEvent::added(mk_pod(
        "ns-0",
        "other-pod-0",
        [("app", "web")],
        None,
    )));
    assert_eq!(result.action, Some(MapAction::Added));
    assert_eq!(test.store().len(), 2);
}

#[test]
fn reapplied_event_updates_in_place() {
    let test = TestConfig::default();

    let first = test.apply(ResourceEvent::added(mk_service(
        "ns-0",
        "web-svc",
        [("app", "web")],
    )));
    assert_eq!(first.action, Some(MapAction::Added));

    let second = test.apply(ResourceEvent::modified(mk_service(
        "ns-0",
        "web-svc",
        [("app", "web")],
    )));
    assert_eq!(second.action, Some(MapAction::Updated));
    assert_eq!(members(&second).services.len(), 1);
    assert_eq!(test.store().len(), 1);
}

#[test]
fn replica_set_joins_deployment_by_owner_reference() {
    let test = TestConfig::default();

    test.apply(ResourceEvent::added(mk_deployment(
        "ns-0",
        "web",
        [("app", "web"), ("tier", "frontend")],
    )));
    let result = test.apply(ResourceEvent::added(mk_replica_set(
        "ns-0",
        "web-6b7f9",
        // The selectors share no subset relation; only the owner reference
        // links the replica set to its deployment.
        [("app", "web"), ("pod-template-hash", "6b7f9")],
        Some("web"),
    )));

    assert_eq!(result.action, Some(MapAction::Updated));
    assert_eq!(members(&result).deployments.len(), 1);
    assert_eq!(members(&result).replica_sets.len(), 1);
    assert_eq!(result.common_label.as_deref(), Some("web-6b7f9"));
}

#[test]
fn deployment_joins_replica_set_by_owner_reference() {
    let test = TestConfig::default();

    test.apply(ResourceEvent::added(mk_replica_set(
        "ns-0",
        "web-6b7f9",
        [("app", "web"), ("pod-template-hash", "6b7f9")],
        Some("web"),
    )));
    let result = test.apply(ResourceEvent::added(mk_deployment(
        "ns-0",
        "web",
        [("app", "web")],
    )));

    assert_eq!(result.action, Some(MapAction::Updated));
    assert_eq!(members(&result).replica_sets.len(), 1);
    assert_eq!(members(&result).deployments.len(), 1);
    // The deployment collection went from zero to one members, so the common
    // label follows it.
    assert_eq!(result.common_label.as_deref(), Some("web"));
}

#[test]
fn pod_joins_replica_set_by_owner_reference() {
    let test = TestConfig::default();

    test.apply(ResourceEvent::added(mk_replica_set(
        "ns-0",
        "web-6b7f9",
        [("app", "web"), ("pod-template-hash", "6b7f9")],
        Some("web"),
    )));

    // No labels at all; only the owner reference can match.
    let result = test.apply(ResourceEvent::added(mk_pod(
        "ns-0",
        "web-6b7f9-zx8c2",
        None::<(&'static str, &'static str)>,
        Some("web-6b7f9"),
    )));

    assert_eq!(result.action, Some(MapAction::Updated));
    assert_eq!(members(&result).pods.len(), 1);
}

#[test]
fn ingress_joins_service_backend() {
    let test = TestConfig::default();

    test.apply(ResourceEvent::added(mk_service(
        "ns-0",
        "web-svc",
        [("app", "web")],
    )));
    let result = test.apply(ResourceEvent::added(mk_ingress("ns-0", "web-ing", "web-svc")));

    assert_eq!(result.action, Some(MapAction::Updated));
    assert_eq!(members(&result).ingresses.len(), 1);

    // An ingress routing to an unknown service seeds its own aggregate.
    let result = test.apply(ResourceEvent::added(mk_ingress("ns-0", "other-ing", "other")));
    assert_eq!(result.action, Some(MapAction::Added));
    assert_eq!(result.common_label.as_deref(), Some("other-ing"));
}

#[test]
fn cascade_shrink_then_dissolve() {
    let test = TestConfig::default();

    test.apply(ResourceEvent::added(mk_service(
        "ns-0",
        "web-svc",
        [("app", "web")],
    )));
    test.apply(ResourceEvent::added(mk_replica_set(
        "ns-0",
        "web-6b7f9",
        [("app", "web")],
        None,
    )));

    // Deleting the only replica set shrinks the aggregate; the live service
    // keeps it alive.
    let result = test.apply(ResourceEvent::deleted(
        ResourceKind::ReplicaSet,
        "ns-0",
        "web-6b7f9",
    ));
    assert_eq!(result.action, Some(MapAction::Updated));
    assert!(members(&result).replica_sets.is_empty());
    assert_eq!(members(&result).services.len(), 1);
    assert_eq!(test.store().len(), 1);

    // Deleting the last member of the last populated collection dissolves it.
    let result = test.apply(ResourceEvent::deleted(
        ResourceKind::Service,
        "ns-0",
        "web-svc",
    ));
    assert_eq!(result.action, Some(MapAction::Deleted));
    assert!(result.common_label.is_some());
    assert!(test.store().is_empty());
}

#[test]
fn ingress_delete_resolves_against_members() {
    let test = TestConfig::default();

    test.apply(ResourceEvent::added(mk_ingress("ns-0", "web-ing", "web-svc")));

    // Ingresses are absent from the signature; the delete path must still
    // find and dissolve the aggregate.
    let result = test.apply(ResourceEvent::deleted(
        ResourceKind::Ingress,
        "ns-0",
        "web-ing",
    ));
    assert_eq!(result.action, Some(MapAction::Deleted));
    assert!(test.store().is_empty());
}

#[test]
fn unmatched_delete_is_noop() {
    let test = TestConfig::default();

    test.apply(ResourceEvent::added(mk_service(
        "ns-0",
        "web-svc",
        [("app", "web")],
    )));

    let result = test.apply(ResourceEvent::deleted(
        ResourceKind::Deployment,
        "ns-0",
        "absent",
    ));
    assert!(!result.is_mapped);
    assert_eq!(result.action, None);
    assert!(result.mapped_resource.is_none());
    assert_eq!(test.store().len(), 1);
}

#[test]
fn namespace_isolation() {
    let test = TestConfig::default();

    test.apply(ResourceEvent::added(mk_service(
        "ns-a",
        "web-svc",
        [("app", "web")],
    )));
    test.apply(ResourceEvent::added(mk_service(
        "ns-b",
        "web-svc",
        [("app", "web")],
    )));
    assert_eq!(test.store().len(), 2);

    // Identical selectors across namespaces must never merge.
    let result = test.apply(ResourceEvent::added(mk_deployment(
        "ns-b",
        "web",
        [("app", "web")],
    )));
    assert_eq!(result.action, Some(MapAction::Updated));
    let aggregate = result.mapped_resource.unwrap();
    assert_eq!(aggregate.namespace, "ns-b");
    assert_eq!(test.store().len(), 2);
}

#[test]
fn signature_tracks_members() {
    let test = TestConfig::default();

    test.apply(ResourceEvent::added(mk_service(
        "ns-0",
        "web-svc",
        [("app", "web")],
    )));
    test.apply(ResourceEvent::added(mk_deployment(
        "ns-0",
        "web",
        [("app", "web")],
    )));
    test.apply(ResourceEvent::added(mk_pod(
        "ns-0",
        "web-pod-0",
        [("app", "web")],
        None,
    )));

    // Every persisted key's signature must match one re-derived from the
    // stored aggregate.
    for key in test.store().list_keys().expect("list keys") {
        let (namespace, id) = keys::decode(&key);
        let raw = test
            .store()
            .get(&key)
            .expect("get aggregate")
            .expect("aggregate present");
        let aggregate: MappedResource = serde_json::from_str(&raw).expect("decode aggregate");
        assert_eq!(namespace, aggregate.namespace);
        assert_eq!(id, MetaIdentifier::of(&aggregate));
    }

    let (_, id) = keys::decode(&test.store().list_keys().unwrap()[0]);
    assert_eq!(
        id.services.match_labels,
        vec![Selector::from(btreemap! {
            "app".to_string() => "web".to_string(),
        })],
    );
}

#[test]
fn first_match_wins_in_lexicographic_key_order() {
    let test = TestConfig::default();

    // Two aggregates with identical selectors, seeded directly so the mapper
    // cannot merge them on the way in.
    for name in ["svc-a", "svc-b"] {
        let service = mk_service("ns-0", name, [("app", "web")]);
        let aggregate = MappedResource {
            common_label: name.to_string(),
            current_type: ResourceKind::Service,
            namespace: "ns-0".to_string(),
            kube: KubeMembers {
                services: vec![service],
                ..Default::default()
            },
        };
        test.store().insert(&aggregate).expect("seed aggregate");
    }

    let result = test.apply(ResourceEvent::added(mk_pod(
        "ns-0",
        "web-pod-0",
        [("app", "web")],
        None,
    )));
    assert_eq!(result.action, Some(MapAction::Updated));
    let winner = &result.mapped_resource.as_ref().unwrap().kube.services[0];
    assert_eq!(winner.metadata.name.as_deref(), Some("svc-a"));
}

#[test]
fn kind_mismatch_is_an_error() {
    let test = TestConfig::default();

    let mut event = ResourceEvent::added(mk_service("ns-0", "web-svc", [("app", "web")]));
    event.kind = ResourceKind::Pod;

    match test.mapper.map(&event) {
        Err(MapError::KindMismatch { kind }) => assert_eq!(kind, ResourceKind::Pod),
        other => panic!("expected kind mismatch, got {other:?}"),
    }
}

/// Wraps a good store with keys that cannot be decoded and one candidate
/// whose aggregate body is corrupt.
struct PoisonedStore {
    inner: MemoryStore,
    corrupt_key: String,
}

impl PoisonedStore {
    fn new() -> Self {
        let corrupt_signature = MetaIdentifier {
            services: crate::KindIdentifier {
                names: ["web-svc".to_string()].into(),
                match_labels: vec![Selector::from(btreemap! {
                    "app".to_string() => "web".to_string(),
                })],
            },
            ..Default::default()
        };
        Self {
            inner: MemoryStore::new(),
            corrupt_key: keys::encode("ns-0", &corrupt_signature),
        }
    }
}

impl Store for PoisonedStore {
    fn list_keys(&self) -> Result<Vec<String>> {
        let mut all = vec!["!!not-base64!!".to_string(), self.corrupt_key.clone()];
        all.extend(self.inner.list_keys()?);
        Ok(all)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        if key == self.corrupt_key {
            return Ok(Some("{half an aggregate".to_string()));
        }
        self.inner.get(key)
    }
}

#[test]
fn malformed_candidates_are_skipped() {
    let _tracing = init_tracing();
    let mapper = Mapper::new(PoisonedStore::new());

    // The corrupt candidate's signature matches this deployment exactly, but
    // its aggregate cannot be decoded; the engine must fall through and
    // create a fresh aggregate instead of failing.
    let result = mapper
        .map(&ResourceEvent::added(mk_deployment(
            "ns-0",
            "web",
            [("app", "web")],
        )))
        .expect("mapping must survive poisoned candidates");

    assert_eq!(result.action, Some(MapAction::Added));
    assert_eq!(result.common_label.as_deref(), Some("web"));
}

/// A store whose list operation fails outright.
struct FailingStore;

impl Store for FailingStore {
    fn list_keys(&self) -> Result<Vec<String>> {
        anyhow::bail!("store unavailable")
    }

    fn get(&self, _: &str) -> Result<Option<String>> {
        anyhow::bail!("store unavailable")
    }
}

#[test]
fn store_failures_propagate() {
    let _tracing = init_tracing();
    let mapper = Mapper::new(FailingStore);

    let result = mapper.map(&ResourceEvent::added(mk_deployment(
        "ns-0",
        "web",
        [("app", "web")],
    )));
    assert!(matches!(result, Err(MapError::Store(_))));
}
