//! Transitive-closure expansion of a seed resource set via owner and spec
//! references, bounded by depth (C4).

use crate::client::{KubeApi, SpecInspector};
use crate::gvk::Gvr;
use crate::resource::{Resource, ResourceKey};
use crate::warning::Warning;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The walk was cancelled before or during a round; whatever had already
/// been collected is discarded (§5: "a cancellation flushes in-flight
/// probes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.is_some_and(CancellationToken::is_cancelled)
}

/// Fallback GVR-resource-to-Kind table, consulted when [`KubeApi::kind_for`]
/// returns `None` (the adapter has no live discovery backing it, or the
/// group is unknown to it).
fn static_kind(resource: &str) -> Option<&'static str> {
    Some(match resource {
        "pods" => "Pod",
        "deployments" => "Deployment",
        "replicasets" => "ReplicaSet",
        "statefulsets" => "StatefulSet",
        "daemonsets" => "DaemonSet",
        "services" => "Service",
        "jobs" => "Job",
        "cronjobs" => "CronJob",
        "configmaps" => "ConfigMap",
        "secrets" => "Secret",
        "persistentvolumeclaims" => "PersistentVolumeClaim",
        "ingresses" => "Ingress",
        "endpoints" => "Endpoints",
        "namespaces" => "Namespace",
        "nodes" => "Node",
        "persistentvolumes" => "PersistentVolume",
        "customresourcedefinitions" => "CustomResourceDefinition",
        "events" => "Event",
        "networkpolicies" => "NetworkPolicy",
        "serviceaccounts" => "ServiceAccount",
        "clusterroles" => "ClusterRole",
        "clusterrolebindings" => "ClusterRoleBinding",
        _ => return None,
    })
}

/// Strict conjunction: every selector key must be present and equal on `candidate`.
fn labels_match(selector: &BTreeMap<String, String>, candidate: &BTreeMap<String, String>) -> bool {
    !selector.is_empty() && selector.iter().all(|(k, v)| candidate.get(k).map(|cv| cv == v).unwrap_or(false))
}

/// Walks owner references and spec references outward from a seed set, up to
/// a bounded number of rounds.
pub struct DependencyResolver {
    api: Arc<dyn KubeApi>,
    inspector: Arc<dyn SpecInspector>,
}

impl DependencyResolver {
    /// Construct a resolver over the given transport and spec inspector.
    pub fn new(api: Arc<dyn KubeApi>, inspector: Arc<dyn SpecInspector>) -> Self {
        Self { api, inspector }
    }

    async fn kind_of(&self, gvr: &Gvr) -> String {
        if let Ok(Some(kind)) = self.api.kind_for(gvr).await {
            return kind;
        }
        static_kind(&gvr.resource).unwrap_or(gvr.resource.as_str()).to_string()
    }

    async fn owned_children(
        &self,
        parent_kind: &str,
        parent_name: &str,
        child_gvr: &Gvr,
        namespace: &str,
        warnings: &mut Vec<Warning>,
    ) -> Vec<Resource> {
        match self.api.list(child_gvr, namespace).await {
            Ok(children) => children
                .into_iter()
                .filter(|c| c.is_owned_by(parent_kind, parent_name))
                .collect(),
            Err(err) => {
                warn!(gvr = %child_gvr, %namespace, error = %err, "owner lookup failed, skipping");
                warnings.push(Warning::new(
                    "resolver",
                    format!("listing {child_gvr} in {namespace:?} for owner lookup failed: {err}"),
                ));
                Vec::new()
            }
        }
    }

    async fn dependencies_of(&self, resource: &Resource, warnings: &mut Vec<Warning>) -> Vec<Resource> {
        match resource.gvr.resource.as_str() {
            "pods" => self.pod_dependencies(resource, warnings).await,
            "deployments" => self.deployment_dependencies(resource, warnings).await,
            "statefulsets" => self.statefulset_dependencies(resource, warnings).await,
            "services" => self.service_dependencies(resource, warnings).await,
            "ingresses" => self.ingress_dependencies(resource, warnings).await,
            _ => Vec::new(),
        }
    }

    async fn pod_dependencies(&self, pod: &Resource, warnings: &mut Vec<Warning>) -> Vec<Resource> {
        let refs = match self.inspector.pod_refs(&pod.namespace, &pod.name).await {
            Ok(Some(refs)) => refs,
            Ok(None) => {
                debug!(namespace = %pod.namespace, name = %pod.name, "no pod spec refs, skipping");
                return Vec::new();
            }
            Err(err) => {
                warn!(namespace = %pod.namespace, name = %pod.name, error = %err, "reading pod spec failed, skipping");
                warnings.push(Warning::new(
                    "resolver",
                    format!("reading pod spec for {}/{} failed: {err}", pod.namespace, pod.name),
                ));
                return Vec::new();
            }
        };
        let mut deps = Vec::new();
        for name in &refs.config_maps {
            if let Ok(Some(r)) = self.api.get(&Gvr::core("v1", "configmaps"), &pod.namespace, name).await {
                deps.push(r);
            }
        }
        for name in &refs.secrets {
            if let Ok(Some(r)) = self.api.get(&Gvr::core("v1", "secrets"), &pod.namespace, name).await {
                deps.push(r);
            }
        }
        for name in &refs.claims {
            if let Ok(Some(r)) = self
                .api
                .get(&Gvr::core("v1", "persistentvolumeclaims"), &pod.namespace, name)
                .await
            {
                deps.push(r);
            }
        }
        match self.api.list(&Gvr::core("v1", "services"), &pod.namespace).await {
            Ok(services) => {
                for svc in services {
                    if let Ok(Some(selector)) = self.inspector.service_selector(&pod.namespace, &svc.name).await {
                        if labels_match(&selector, &refs.labels) {
                            deps.push(svc);
                        }
                    }
                }
            }
            Err(err) => {
                warn!(namespace = %pod.namespace, error = %err, "listing services failed, skipping");
                warnings.push(Warning::new(
                    "resolver",
                    format!("listing services in {:?} failed: {err}", pod.namespace),
                ));
            }
        }
        deps
    }

    async fn deployment_dependencies(&self, deployment: &Resource, warnings: &mut Vec<Warning>) -> Vec<Resource> {
        let deployment_kind = self.kind_of(&deployment.gvr).await;
        let rs_gvr = Gvr::new("apps", "v1", "replicasets");
        let replica_sets = self
            .owned_children(&deployment_kind, &deployment.name, &rs_gvr, &deployment.namespace, warnings)
            .await;
        let rs_kind = self.kind_of(&rs_gvr).await;
        let pod_gvr = Gvr::core("v1", "pods");
        let mut deps = Vec::new();
        for rs in replica_sets {
            let pods = self.owned_children(&rs_kind, &rs.name, &pod_gvr, &rs.namespace, warnings).await;
            deps.push(rs);
            deps.extend(pods);
        }
        deps
    }

    async fn statefulset_dependencies(&self, statefulset: &Resource, warnings: &mut Vec<Warning>) -> Vec<Resource> {
        let kind = self.kind_of(&statefulset.gvr).await;
        let pod_gvr = Gvr::core("v1", "pods");
        let mut deps = self
            .owned_children(&kind, &statefulset.name, &pod_gvr, &statefulset.namespace, warnings)
            .await;
        let pvc_gvr = Gvr::core("v1", "persistentvolumeclaims");
        let prefix = format!("{}-", statefulset.name);
        match self.api.list(&pvc_gvr, &statefulset.namespace).await {
            Ok(claims) => deps.extend(claims.into_iter().filter(|c| c.name.starts_with(&prefix))),
            Err(err) => {
                warn!(namespace = %statefulset.namespace, error = %err, "listing PVCs failed, skipping");
                warnings.push(Warning::new(
                    "resolver",
                    format!("listing PVCs in {:?} failed: {err}", statefulset.namespace),
                ));
            }
        }
        deps
    }

    async fn service_dependencies(&self, service: &Resource, warnings: &mut Vec<Warning>) -> Vec<Resource> {
        let mut deps = Vec::new();
        match self
            .api
            .get(&Gvr::core("v1", "endpoints"), &service.namespace, &service.name)
            .await
        {
            Ok(Some(endpoints)) => deps.push(endpoints),
            Ok(None) => debug!(namespace = %service.namespace, name = %service.name, "no endpoints object for service"),
            Err(err) => {
                warn!(namespace = %service.namespace, name = %service.name, error = %err, "getting endpoints failed, skipping");
                warnings.push(Warning::new(
                    "resolver",
                    format!("getting endpoints {}/{} failed: {err}", service.namespace, service.name),
                ));
            }
        }
        let selector = match self.inspector.service_selector(&service.namespace, &service.name).await {
            Ok(Some(selector)) => selector,
            Ok(None) => return deps,
            Err(err) => {
                warn!(namespace = %service.namespace, name = %service.name, error = %err, "reading service selector failed, skipping");
                warnings.push(Warning::new(
                    "resolver",
                    format!("reading selector for service {}/{} failed: {err}", service.namespace, service.name),
                ));
                return deps;
            }
        };
        match self.api.list(&Gvr::core("v1", "pods"), &service.namespace).await {
            Ok(pods) => deps.extend(pods.into_iter().filter(|p| labels_match(&selector, &p.labels))),
            Err(err) => {
                warn!(namespace = %service.namespace, error = %err, "listing pods failed, skipping");
                warnings.push(Warning::new(
                    "resolver",
                    format!("listing pods in {:?} failed: {err}", service.namespace),
                ));
            }
        }
        deps
    }

    async fn ingress_dependencies(&self, ingress: &Resource, warnings: &mut Vec<Warning>) -> Vec<Resource> {
        let backends = match self.inspector.ingress_backends(&ingress.namespace, &ingress.name).await {
            Ok(Some(b)) => b,
            Ok(None) => {
                debug!(namespace = %ingress.namespace, name = %ingress.name, "no backends for ingress");
                return Vec::new();
            }
            Err(err) => {
                warn!(namespace = %ingress.namespace, name = %ingress.name, error = %err, "reading ingress backends failed, skipping");
                warnings.push(Warning::new(
                    "resolver",
                    format!("reading backends for ingress {}/{} failed: {err}", ingress.namespace, ingress.name),
                ));
                return Vec::new();
            }
        };
        let mut deps = Vec::new();
        for name in &backends.service_names {
            if let Ok(Some(r)) = self.api.get(&Gvr::core("v1", "services"), &ingress.namespace, name).await {
                deps.push(r);
            }
        }
        deps
    }

    /// Expand `seed` into its transitive closure, bounded by `max_depth`
    /// rounds. `max_depth == 0` returns the seed unchanged (B2). Terminates
    /// early once a round discovers nothing new (P6).
    ///
    /// `cancellation`, if set, is checked before the walk starts, before
    /// each round, and before each resource's dependency lookup within a
    /// round — a single round can issue many API calls, so per-resource is
    /// the loop-iteration granularity §5 requires here.
    pub async fn resolve(
        &self,
        seed: Vec<Resource>,
        max_depth: u32,
        cancellation: Option<&CancellationToken>,
    ) -> Result<(Vec<Resource>, Vec<Warning>), Cancelled> {
        let mut warnings = Vec::new();
        if max_depth == 0 {
            return Ok((seed, warnings));
        }
        if is_cancelled(cancellation) {
            return Err(Cancelled);
        }
        let mut visited: HashSet<ResourceKey> = seed.iter().map(Resource::key).collect();
        let mut all = seed.clone();
        let mut frontier = seed;
        for _round in 0..max_depth {
            if is_cancelled(cancellation) {
                return Err(Cancelled);
            }
            let mut next_frontier = Vec::new();
            for resource in &frontier {
                if is_cancelled(cancellation) {
                    return Err(Cancelled);
                }
                let deps = self.dependencies_of(resource, &mut warnings).await;
                for dep in deps {
                    if visited.insert(dep.key()) {
                        next_frontier.push(dep.clone());
                        all.push(dep);
                    }
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }
        Ok((all, warnings))
    }
}
