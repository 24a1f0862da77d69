//! Cached RBAC probe over the consumed [`KubeApi`] transport (C2).

use crate::cache::{CacheKey, Lookup, PermissionCache, SweeperHandle};
use crate::client::KubeApi;
use crate::gvk::Gvr;
use crate::resource::Resource;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// GVRs where a `get` allow is not sufficient on its own — the caller must
/// also be able to `list` the type for the resource to be usable in a
/// collection plan (these are the kinds the scanner enumerates by listing).
const LIST_REQUIRED: &[&str] = &[
    "pods",
    "events",
    "configmaps",
    "persistentvolumeclaims",
    "deployments",
    "statefulsets",
    "daemonsets",
    "replicasets",
    "services",
    "ingresses",
    "networkpolicies",
    "customresourcedefinitions",
];

fn requires_list_probe(gvr: &Gvr) -> bool {
    LIST_REQUIRED.contains(&gvr.resource.as_str())
}

/// Default TTL for cached probe outcomes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Decides whether the caller may read a given resource, backed by a
/// [`PermissionCache`] so repeated probes against the same key within the TTL
/// never reach the transport twice.
pub struct RbacProbe {
    api: Arc<dyn KubeApi>,
    cache: PermissionCache,
    _sweeper: SweeperHandle,
}

impl RbacProbe {
    /// Construct a probe with the default cache TTL, starting its sweeper task.
    pub fn new(api: Arc<dyn KubeApi>) -> Self {
        Self::with_ttl(api, DEFAULT_CACHE_TTL)
    }

    /// Construct a probe with an explicit cache TTL.
    pub fn with_ttl(api: Arc<dyn KubeApi>, ttl: Duration) -> Self {
        let cache = PermissionCache::new(ttl);
        let sweeper = cache.spawn_sweeper();
        Self {
            api,
            cache,
            _sweeper: sweeper,
        }
    }

    /// Direct access to the underlying cache, e.g. for `clear()` before a retry.
    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    async fn probe(&self, verb: &str, gvr: &Gvr, namespace: &str, name: &str) -> Result<bool, String> {
        let key = CacheKey::new(namespace, verb, gvr, name);
        if let Lookup::Hit { allowed, error } = self.cache.get(&key) {
            return match error {
                Some(e) => Err(e),
                None => Ok(allowed),
            };
        }
        match self.api.can_i(verb, gvr, namespace, name).await {
            Ok(decision) => {
                self.cache.set(key, decision.allowed, None);
                Ok(decision.allowed)
            }
            Err(err) => {
                let message = err.to_string();
                warn!(%verb, %gvr, %namespace, %name, error = %message, "access review failed");
                self.cache.set(key, false, Some(message.clone()));
                Err(message)
            }
        }
    }

    /// Decide whether the caller may read `resource`.
    ///
    /// Probes `get` first; if denied, the resource is not accessible. If
    /// allowed and the GVR is in the list-required set, additionally probes
    /// `list` at the type level and returns that outcome instead. An API
    /// error from the transport is surfaced to the caller (for logging) —
    /// the individual resource is dropped from discovery rather than
    /// aborting the run.
    pub async fn check_access(&self, resource: &Resource) -> Result<bool, String> {
        let allowed_get = self
            .probe("get", &resource.gvr, &resource.namespace, &resource.name)
            .await?;
        if !allowed_get {
            return Ok(false);
        }
        if requires_list_probe(&resource.gvr) {
            return self.probe("list", &resource.gvr, &resource.namespace, "").await;
        }
        Ok(true)
    }

    /// Probe `get` on the `namespaces` resource for `ns`.
    pub async fn check_namespace_access(&self, ns: &str) -> Result<bool, String> {
        let gvr = Gvr::core("v1", "namespaces");
        self.probe("get", &gvr, "", ns).await
    }

    /// Return the subset of `candidates` the caller may access.
    pub async fn accessible_namespaces(&self, candidates: &[String]) -> Vec<String> {
        let mut accessible = Vec::with_capacity(candidates.len());
        for ns in candidates {
            if matches!(self.check_namespace_access(ns).await, Ok(true)) {
                accessible.push(ns.clone());
            }
        }
        accessible
    }

    /// Probe `list` at the type level for `gvr` in `namespace`.
    pub async fn check_resource_type_access(&self, gvr: &Gvr, namespace: &str) -> Result<bool, String> {
        self.probe("list", gvr, namespace, "").await
    }
}
