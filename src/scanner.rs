//! Enumerates a fixed catalog of GVRs across a namespace set (C3).

use crate::client::KubeApi;
use crate::error::{ScanError, TransportError};
use crate::filter::ResourceFilter;
use crate::gvk::Gvr;
use crate::resource::Resource;
use crate::warning::Warning;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.is_some_and(CancellationToken::is_cancelled)
}

/// Whether a catalog kind is namespaced or cluster-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Lives inside a namespace.
    Namespaced,
    /// Has no namespace.
    Cluster,
}

/// One entry in the built-in discovery catalog.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// The kind this entry enumerates.
    pub gvr: Gvr,
    /// Whether it is namespaced or cluster-scoped.
    pub scope: Scope,
}

fn entry(group: &str, version: &str, resource: &str, scope: Scope) -> CatalogEntry {
    CatalogEntry {
        gvr: Gvr::new(group, version, resource),
        scope,
    }
}

/// The built-in catalog: core workloads, configmaps, secrets, events, PVCs;
/// apps workloads; networking; batch; plus the fixed cluster-scoped set
/// (nodes, PVs, storage classes, CRDs, cluster roles/bindings, webhooks,
/// priority/runtime classes, PSPs, volume attachments, CSI drivers/nodes).
pub fn default_catalog() -> Vec<CatalogEntry> {
    use Scope::{Cluster, Namespaced};
    vec![
        entry("", "v1", "pods", Namespaced),
        entry("", "v1", "configmaps", Namespaced),
        entry("", "v1", "secrets", Namespaced),
        entry("", "v1", "events", Namespaced),
        entry("", "v1", "persistentvolumeclaims", Namespaced),
        entry("", "v1", "services", Namespaced),
        entry("", "v1", "serviceaccounts", Namespaced),
        entry("apps", "v1", "deployments", Namespaced),
        entry("apps", "v1", "statefulsets", Namespaced),
        entry("apps", "v1", "daemonsets", Namespaced),
        entry("apps", "v1", "replicasets", Namespaced),
        entry("networking.k8s.io", "v1", "ingresses", Namespaced),
        entry("networking.k8s.io", "v1", "networkpolicies", Namespaced),
        entry("batch", "v1", "jobs", Namespaced),
        entry("batch", "v1", "cronjobs", Namespaced),
        entry("", "v1", "nodes", Cluster),
        entry("", "v1", "persistentvolumes", Cluster),
        entry("storage.k8s.io", "v1", "storageclasses", Cluster),
        entry("apiextensions.k8s.io", "v1", "customresourcedefinitions", Cluster),
        entry("rbac.authorization.k8s.io", "v1", "clusterroles", Cluster),
        entry("rbac.authorization.k8s.io", "v1", "clusterrolebindings", Cluster),
        entry("admissionregistration.k8s.io", "v1", "mutatingwebhookconfigurations", Cluster),
        entry("admissionregistration.k8s.io", "v1", "validatingwebhookconfigurations", Cluster),
        entry("scheduling.k8s.io", "v1", "priorityclasses", Cluster),
        entry("node.k8s.io", "v1", "runtimeclasses", Cluster),
        entry("policy", "v1beta1", "podsecuritypolicies", Cluster),
        entry("storage.k8s.io", "v1", "volumeattachments", Cluster),
        entry("storage.k8s.io", "v1", "csidrivers", Cluster),
        entry("storage.k8s.io", "v1", "csinodes", Cluster),
    ]
}

/// Scans a fixed catalog of GVRs across a namespace set, applying a
/// [`ResourceFilter`].
pub struct NamespaceScanner {
    api: Arc<dyn KubeApi>,
    /// Max number of concurrent `(gvr, namespace)` list calls in flight.
    pub concurrency: usize,
}

impl NamespaceScanner {
    /// Construct a scanner over the given transport.
    pub fn new(api: Arc<dyn KubeApi>) -> Self {
        Self { api, concurrency: 8 }
    }

    /// Scan the catalog (or `filter`'s explicit include-GVR override) across
    /// `requested_namespaces` (empty = auto-discover all namespaces),
    /// applying `filter`.
    ///
    /// A namespace-list failure while auto-discovering is fatal; a list
    /// failure for one `(gvr, namespace)` pair is logged and skipped.
    ///
    /// `cancellation`, if set, is checked before the namespace list call,
    /// before each `(gvr, namespace)` job is issued, and once more after the
    /// fan-out drains — per §5, every API call and every loop iteration over
    /// the job list is a cancellation point. A trip discards whatever was
    /// already found and returns [`ScanError::Cancelled`].
    pub async fn scan(
        &self,
        requested_namespaces: &[String],
        filter: &ResourceFilter,
        cancellation: Option<&CancellationToken>,
    ) -> Result<(Vec<Resource>, Vec<Warning>), ScanError> {
        if is_cancelled(cancellation) {
            return Err(ScanError::Cancelled);
        }

        let mut warnings = Vec::new();
        if filter.has_unparseable_selector() {
            warn!(selector = ?filter.label_selector, "unparseable label selector, ignoring");
            warnings.push(Warning::new(
                "scanner",
                format!("unparseable label selector {:?}, ignoring", filter.label_selector),
            ));
        }

        let explicit_namespaces = !requested_namespaces.is_empty();
        let namespaces: Vec<String> = if explicit_namespaces {
            requested_namespaces.to_vec()
        } else {
            self.api.list_namespaces().await.map_err(ScanError::NamespaceList)?
        };

        if is_cancelled(cancellation) {
            return Err(ScanError::Cancelled);
        }

        let catalog = if filter.include_gvrs.is_empty() {
            default_catalog()
        } else {
            filter
                .include_gvrs
                .iter()
                .map(|gvr| CatalogEntry {
                    gvr: gvr.clone(),
                    scope: Scope::Namespaced,
                })
                .collect()
        };

        let mut jobs: Vec<(Gvr, String)> = Vec::new();
        for entry in &catalog {
            match entry.scope {
                Scope::Namespaced => {
                    for ns in &namespaces {
                        jobs.push((entry.gvr.clone(), ns.clone()));
                    }
                }
                Scope::Cluster => {
                    // B3: a cluster-scoped GVR is dropped from the scan once
                    // the caller has narrowed scope to explicit namespaces.
                    if !explicit_namespaces {
                        jobs.push((entry.gvr.clone(), String::new()));
                    }
                }
            }
        }

        let api = self.api.clone();
        let token = cancellation.cloned();
        let results: Vec<(Gvr, String, Option<Result<Vec<Resource>, TransportError>>)> = stream::iter(jobs)
            .map(|(gvr, ns)| {
                let api = api.clone();
                let token = token.clone();
                async move {
                    // Checked per job: a job already in flight when
                    // cancellation trips still completes (it's cheaper than
                    // racing the call), but no result from it is kept.
                    if is_cancelled(token.as_ref()) {
                        return (gvr, ns, None);
                    }
                    let result = api.list(&gvr, &ns).await;
                    (gvr, ns, Some(result))
                }
            })
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        if is_cancelled(cancellation) {
            return Err(ScanError::Cancelled);
        }

        let mut found = Vec::new();
        for (gvr, ns, result) in results {
            match result {
                None => continue,
                Some(Ok(resources)) => found.extend(resources),
                Some(Err(err)) => {
                    warn!(%gvr, namespace = %ns, error = %err, "listing failed, skipping");
                    warnings.push(Warning::new(
                        "scanner",
                        format!("listing {gvr} in namespace {ns:?} failed: {err}"),
                    ));
                }
            }
        }

        let filtered = found.into_iter().filter(|r| filter.matches(r)).collect();
        Ok((filtered, warnings))
    }
}
