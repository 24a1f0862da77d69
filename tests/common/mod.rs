//! A shared in-memory fake of the consumed [`KubeApi`]/[`SpecInspector`]
//! traits, used by the scenario tests in this directory. Fakes the
//! transport, exercises the real pipeline logic — the same style
//! `kube-client`'s `mock_tests.rs` uses, minus standing up a fake API
//! server.

#![allow(dead_code)]

use async_trait::async_trait;
use bundle_discovery::client::{AccessDecision, IngressBackends, KubeApi, PodRefs, SpecInspector};
use bundle_discovery::error::TransportError;
use bundle_discovery::gvk::Gvr;
use bundle_discovery::resource::{OwnerRef, Resource};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Installs a `tracing` subscriber for the duration of the test process, so
/// the `tracing::warn!`/`debug!` calls the pipeline emits on dropped
/// resources and skipped partial failures are visible with `--nocapture`.
/// Safe to call from every test: `try_init` is a no-op once a subscriber is
/// already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Builds a [`Resource`] with no labels or owner references.
pub fn resource(group: &str, version: &str, kind_resource: &str, ns: &str, name: &str) -> Resource {
    Resource {
        gvr: Gvr::new(group, version, kind_resource),
        namespace: ns.to_string(),
        name: name.to_string(),
        labels: BTreeMap::new(),
        owner_references: Vec::new(),
    }
}

/// As [`resource`], with labels attached.
pub fn labeled(group: &str, version: &str, kind_resource: &str, ns: &str, name: &str, labels: &[(&str, &str)]) -> Resource {
    let mut r = resource(group, version, kind_resource, ns, name);
    r.labels = labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    r
}

/// A pod-shaped [`Resource`] in the core group.
pub fn pod(ns: &str, name: &str) -> Resource {
    resource("", "v1", "pods", ns, name)
}

/// A pod with labels, for heuristic/selector tests.
pub fn labeled_pod(ns: &str, name: &str, labels: &[(&str, &str)]) -> Resource {
    labeled("", "v1", "pods", ns, name, labels)
}

#[derive(Default)]
pub struct FakeClusterBuilder {
    namespaces: Vec<String>,
    resources: Vec<Resource>,
    pod_refs: BTreeMap<(String, String), PodRefs>,
    service_selectors: BTreeMap<(String, String), BTreeMap<String, String>>,
    ingress_backends: BTreeMap<(String, String), IngressBackends>,
    access: BTreeMap<(String, String, String), bool>,
}

impl FakeClusterBuilder {
    pub fn namespace(mut self, ns: &str) -> Self {
        self.namespaces.push(ns.to_string());
        self
    }

    pub fn resource(mut self, r: Resource) -> Self {
        self.resources.push(r);
        self
    }

    pub fn resources(mut self, rs: impl IntoIterator<Item = Resource>) -> Self {
        self.resources.extend(rs);
        self
    }

    pub fn pod_refs(mut self, ns: &str, name: &str, refs: PodRefs) -> Self {
        self.pod_refs.insert((ns.to_string(), name.to_string()), refs);
        self
    }

    pub fn service_selector(mut self, ns: &str, name: &str, selector: &[(&str, &str)]) -> Self {
        self.service_selectors.insert(
            (ns.to_string(), name.to_string()),
            selector.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        );
        self
    }

    pub fn ingress_backends(mut self, ns: &str, name: &str, service_names: &[&str]) -> Self {
        self.ingress_backends.insert(
            (ns.to_string(), name.to_string()),
            IngressBackends {
                service_names: service_names.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    /// `verb`/`kind_resource` pair allowed or denied for every namespace and name.
    pub fn allow(mut self, verb: &str, kind_resource: &str, ns: &str, allowed: bool) -> Self {
        self.access.insert((verb.to_string(), kind_resource.to_string(), ns.to_string()), allowed);
        self
    }

    pub fn build(self) -> FakeCluster {
        FakeCluster {
            namespaces: self.namespaces,
            resources: Mutex::new(self.resources),
            pod_refs: self.pod_refs,
            service_selectors: self.service_selectors,
            ingress_backends: self.ingress_backends,
            access: self.access,
            probe_calls: AtomicUsize::new(0),
        }
    }
}

pub struct FakeCluster {
    namespaces: Vec<String>,
    resources: Mutex<Vec<Resource>>,
    pod_refs: BTreeMap<(String, String), PodRefs>,
    service_selectors: BTreeMap<(String, String), BTreeMap<String, String>>,
    ingress_backends: BTreeMap<(String, String), IngressBackends>,
    access: BTreeMap<(String, String, String), bool>,
    probe_calls: AtomicUsize,
}

impl FakeCluster {
    pub fn builder() -> FakeClusterBuilder {
        FakeClusterBuilder::default()
    }

    pub fn probe_call_count(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KubeApi for FakeCluster {
    async fn list(&self, gvr: &Gvr, namespace: &str) -> Result<Vec<Resource>, TransportError> {
        let resources = self.resources.lock().unwrap();
        Ok(resources
            .iter()
            .filter(|r| &r.gvr == gvr && (namespace.is_empty() || r.namespace == namespace))
            .cloned()
            .collect())
    }

    async fn get(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<Option<Resource>, TransportError> {
        let resources = self.resources.lock().unwrap();
        Ok(resources
            .iter()
            .find(|r| &r.gvr == gvr && r.namespace == namespace && r.name == name)
            .cloned())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.namespaces.clone())
    }

    async fn can_i(&self, verb: &str, gvr: &Gvr, namespace: &str, _name: &str) -> Result<AccessDecision, TransportError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let allowed = *self
            .access
            .get(&(verb.to_string(), gvr.resource.clone(), namespace.to_string()))
            .unwrap_or(&false);
        Ok(AccessDecision { allowed })
    }
}

#[async_trait]
impl SpecInspector for FakeCluster {
    async fn pod_refs(&self, namespace: &str, pod_name: &str) -> Result<Option<PodRefs>, TransportError> {
        Ok(self.pod_refs.get(&(namespace.to_string(), pod_name.to_string())).cloned())
    }

    async fn ingress_backends(&self, namespace: &str, ingress_name: &str) -> Result<Option<IngressBackends>, TransportError> {
        Ok(self
            .ingress_backends
            .get(&(namespace.to_string(), ingress_name.to_string()))
            .cloned())
    }

    async fn service_selector(&self, namespace: &str, service_name: &str) -> Result<Option<BTreeMap<String, String>>, TransportError> {
        Ok(self
            .service_selectors
            .get(&(namespace.to_string(), service_name.to_string()))
            .cloned())
    }
}

pub fn owner(kind: &str, name: &str) -> OwnerRef {
    OwnerRef {
        kind: kind.to_string(),
        name: name.to_string(),
        controller: true,
    }
}
