//! The "Kubernetes-like REST client" the core consumes (§6).
//!
//! This is deliberately a thin trait, not a reimplementation of a
//! Kubernetes client — the real implementation is `KubeApiClient`, a thin
//! adapter over the `kube`/`k8s-openapi` crates (feature `client`), grounded
//! in how `kube-client::discovery::Discovery` and `kube-client::Api` are
//! used together in practice.

use crate::error::TransportError;
use crate::gvk::Gvr;
use crate::resource::{OwnerRef, Resource};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// A single RBAC probe outcome from [`KubeApi::can_i`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    /// Whether the verb was allowed.
    pub allowed: bool,
}

/// The transport the discovery pipeline consumes. Implementations are
/// expected to be cheap to clone and safe to call concurrently — the real
/// `kube::Client` is exactly this (an `Arc`-backed `tower::Service`).
#[async_trait]
pub trait KubeApi: Send + Sync {
    /// List all objects of `gvr` in `namespace` (empty string for cluster-scoped
    /// or all-namespaces, depending on the kind).
    async fn list(&self, gvr: &Gvr, namespace: &str) -> Result<Vec<Resource>, TransportError>;

    /// Get a single named object, used by the dependency resolver to pull
    /// individual configmaps/secrets/services referenced by a pod.
    async fn get(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<Option<Resource>, TransportError>;

    /// List all namespaces in the cluster, used when [`DiscoveryOptions::namespaces`](crate::options::DiscoveryOptions::namespaces) is empty.
    async fn list_namespaces(&self) -> Result<Vec<String>, TransportError>;

    /// Ask whether the caller may perform `verb` on `gvr` (optionally scoped to
    /// `namespace`/`name`), via a `SelfSubjectAccessReview`-equivalent call.
    async fn can_i(
        &self,
        verb: &str,
        gvr: &Gvr,
        namespace: &str,
        name: &str,
    ) -> Result<AccessDecision, TransportError>;

    /// Best-effort resolution of the `Kind` string for a GVR, used to confirm
    /// owner-reference matches beyond the static fallback table. Returning
    /// `Ok(None)` falls back to that static table.
    async fn kind_for(&self, _gvr: &Gvr) -> Result<Option<String>, TransportError> {
        Ok(None)
    }
}

/// The volumes/env/selector payload the resolver needs out of a Pod spec,
/// abstracted so [`KubeApi`] implementations don't need to expose raw
/// `k8s_openapi::api::core::v1::PodSpec` to the resolver.
#[derive(Debug, Clone, Default)]
pub struct PodRefs {
    /// Names of configmaps referenced by volumes, `envFrom`, or `env.valueFrom`.
    pub config_maps: Vec<String>,
    /// Names of secrets referenced by volumes, `envFrom`, or `env.valueFrom`.
    pub secrets: Vec<String>,
    /// Names of PVCs referenced by `persistentVolumeClaim` volumes.
    pub claims: Vec<String>,
    /// Labels on the pod, for service-selector matching.
    pub labels: BTreeMap<String, String>,
}

/// Service-backend references extracted from an Ingress spec.
#[derive(Debug, Clone, Default)]
pub struct IngressBackends {
    /// Service names named by `defaultBackend` and each rule's paths.
    pub service_names: Vec<String>,
}

/// Spec-shaped lookups the dependency resolver needs beyond plain list/get.
/// Kept separate from [`KubeApi`] so a fake implementation used in tests only
/// has to implement what a given scenario exercises.
#[async_trait]
pub trait SpecInspector: Send + Sync {
    /// Extract the config/secret/PVC references and labels of a pod.
    async fn pod_refs(&self, namespace: &str, pod_name: &str) -> Result<Option<PodRefs>, TransportError>;

    /// Extract the service-name references of an ingress.
    async fn ingress_backends(
        &self,
        namespace: &str,
        ingress_name: &str,
    ) -> Result<Option<IngressBackends>, TransportError>;

    /// The label selector of a Service, for matching against pod labels.
    async fn service_selector(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, TransportError>;
}

#[cfg(feature = "client")]
pub mod live {
    //! The real [`KubeApi`]/[`SpecInspector`] implementation, backed by
    //! `kube::Client` + `kube::Api<DynamicObject>` + `k8s_openapi`'s
    //! `authorization.k8s.io/v1::SelfSubjectAccessReview`.
    //!
    //! Mirrors `kube-client::util::auth::AuthClient`, adapted from the
    //! user-impersonating `SubjectAccessReview` to the caller's own
    //! `SelfSubjectAccessReview`, since this crate only ever probes its own
    //! effective permissions. [`SpecInspector`] is implemented against the
    //! typed `k8s_openapi::api::core::v1::{Pod, Service}` and
    //! `networking::v1::Ingress` shapes rather than the dynamic object the
    //! rest of this module uses, since the resolver needs the structured
    //! `PodSpec`/`ServiceSpec`/`IngressSpec` fields (volumes, env, selectors,
    //! backends), not just labels and owner references.

    use super::*;
    use crate::resource::Resource as DiscoveredResource;
    use k8s_openapi::api::authorization::v1::{
        ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
    };
    use kube::api::{Api, DynamicObject};
    use kube::core::{GroupVersionKind, ObjectMeta};
    use kube::discovery::ApiResource;
    use kube::Client;

    /// Thin adapter over a real cluster `Client`.
    #[derive(Clone)]
    pub struct KubeApiClient {
        client: Client,
    }

    impl KubeApiClient {
        /// Wrap an already-constructed `kube::Client`.
        pub fn new(client: Client) -> Self {
            Self { client }
        }

        fn api_resource(gvr: &Gvr) -> ApiResource {
            let gvk = GroupVersionKind::gvk(&gvr.group, &gvr.version, "");
            ApiResource::from_gvk_with_plural(&gvk, &gvr.resource)
        }

        fn to_resource(gvr: &Gvr, obj: DynamicObject) -> DiscoveredResource {
            let meta: &ObjectMeta = &obj.metadata;
            let labels = meta.labels.clone().unwrap_or_default().into_iter().collect();
            let owner_references = meta
                .owner_references
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(|o| OwnerRef {
                    kind: o.kind,
                    name: o.name,
                    controller: o.controller.unwrap_or(false),
                })
                .collect();
            DiscoveredResource {
                gvr: gvr.clone(),
                namespace: meta.namespace.clone().unwrap_or_default(),
                name: meta.name.clone().unwrap_or_default(),
                labels,
                owner_references,
            }
        }

        fn api_for(&self, gvr: &Gvr, namespace: &str) -> Api<DynamicObject> {
            let ar = Self::api_resource(gvr);
            if namespace.is_empty() {
                Api::all_with(self.client.clone(), &ar)
            } else {
                Api::namespaced_with(self.client.clone(), namespace, &ar)
            }
        }

        fn map_err(err: kube::Error) -> TransportError {
            match err {
                kube::Error::Api(resp) => TransportError::Api {
                    status: resp.code,
                    message: resp.message,
                },
                other => TransportError::Connection(other.to_string()),
            }
        }
    }

    #[async_trait]
    impl KubeApi for KubeApiClient {
        async fn list(&self, gvr: &Gvr, namespace: &str) -> Result<Vec<DiscoveredResource>, TransportError> {
            let api = self.api_for(gvr, namespace);
            let list = api
                .list(&Default::default())
                .await
                .map_err(Self::map_err)?;
            Ok(list.items.into_iter().map(|obj| Self::to_resource(gvr, obj)).collect())
        }

        async fn get(
            &self,
            gvr: &Gvr,
            namespace: &str,
            name: &str,
        ) -> Result<Option<DiscoveredResource>, TransportError> {
            let api = self.api_for(gvr, namespace);
            match api.get_opt(name).await.map_err(Self::map_err)? {
                Some(obj) => Ok(Some(Self::to_resource(gvr, obj))),
                None => Ok(None),
            }
        }

        async fn list_namespaces(&self) -> Result<Vec<String>, TransportError> {
            use k8s_openapi::api::core::v1::Namespace;
            let api: Api<Namespace> = Api::all(self.client.clone());
            let list = api.list(&Default::default()).await.map_err(Self::map_err)?;
            Ok(list.items.into_iter().filter_map(|ns| ns.metadata.name).collect())
        }

        async fn can_i(
            &self,
            verb: &str,
            gvr: &Gvr,
            namespace: &str,
            name: &str,
        ) -> Result<AccessDecision, TransportError> {
            let reviews: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
            let mut attrs = ResourceAttributes {
                group: Some(gvr.group.clone()),
                version: Some(gvr.version.clone()),
                resource: Some(gvr.resource.clone()),
                verb: Some(verb.to_string()),
                ..Default::default()
            };
            if !namespace.is_empty() {
                attrs.namespace = Some(namespace.to_string());
            }
            if !name.is_empty() {
                attrs.name = Some(name.to_string());
            }
            let review = SelfSubjectAccessReview {
                spec: SelfSubjectAccessReviewSpec {
                    resource_attributes: Some(attrs),
                    ..Default::default()
                },
                ..Default::default()
            };
            let result = reviews
                .create(&Default::default(), &review)
                .await
                .map_err(Self::map_err)?;
            let allowed = result.status.map(|s| s.allowed).unwrap_or(false);
            Ok(AccessDecision { allowed })
        }

        async fn kind_for(&self, gvr: &Gvr) -> Result<Option<String>, TransportError> {
            let discovery = kube::discovery::Discovery::new(self.client.clone())
                .run()
                .await
                .map_err(Self::map_err)?;
            Ok(discovery
                .groups()
                .find(|g| g.name() == gvr.group)
                .and_then(|g| {
                    g.recommended_resources()
                        .into_iter()
                        .find(|(ar, _)| ar.version == gvr.version && ar.plural == gvr.resource)
                        .map(|(ar, _)| ar.kind)
                }))
        }
    }

    #[async_trait]
    impl SpecInspector for KubeApiClient {
        async fn pod_refs(&self, namespace: &str, pod_name: &str) -> Result<Option<PodRefs>, TransportError> {
            use k8s_openapi::api::core::v1::Pod;
            let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
            let pod = match api.get_opt(pod_name).await.map_err(Self::map_err)? {
                Some(pod) => pod,
                None => return Ok(None),
            };
            let labels = pod.metadata.labels.clone().unwrap_or_default().into_iter().collect();
            let Some(spec) = pod.spec else {
                return Ok(Some(PodRefs { config_maps: Vec::new(), secrets: Vec::new(), claims: Vec::new(), labels }));
            };

            let mut config_maps = Vec::new();
            let mut secrets = Vec::new();
            let mut claims = Vec::new();

            for volume in spec.volumes.iter().flatten() {
                if let Some(name) = volume.config_map.as_ref().and_then(|cm| cm.name.clone()) {
                    config_maps.push(name);
                }
                if let Some(name) = volume.secret.as_ref().and_then(|s| s.secret_name.clone()) {
                    secrets.push(name);
                }
                if let Some(pvc) = &volume.persistent_volume_claim {
                    claims.push(pvc.claim_name.clone());
                }
            }

            let all_containers = spec.containers.iter().chain(spec.init_containers.iter().flatten());
            for container in all_containers {
                for env in container.env.iter().flatten() {
                    let Some(value_from) = &env.value_from else { continue };
                    if let Some(name) = value_from.config_map_key_ref.as_ref().and_then(|r| r.name.clone()) {
                        config_maps.push(name);
                    }
                    if let Some(name) = value_from.secret_key_ref.as_ref().and_then(|r| r.name.clone()) {
                        secrets.push(name);
                    }
                }
                for env_from in container.env_from.iter().flatten() {
                    if let Some(name) = env_from.config_map_ref.as_ref().and_then(|r| r.name.clone()) {
                        config_maps.push(name);
                    }
                    if let Some(name) = env_from.secret_ref.as_ref().and_then(|r| r.name.clone()) {
                        secrets.push(name);
                    }
                }
            }

            config_maps.sort();
            config_maps.dedup();
            secrets.sort();
            secrets.dedup();
            claims.sort();
            claims.dedup();

            Ok(Some(PodRefs { config_maps, secrets, claims, labels }))
        }

        async fn ingress_backends(
            &self,
            namespace: &str,
            ingress_name: &str,
        ) -> Result<Option<IngressBackends>, TransportError> {
            use k8s_openapi::api::networking::v1::Ingress;
            let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
            let ingress = match api.get_opt(ingress_name).await.map_err(Self::map_err)? {
                Some(ingress) => ingress,
                None => return Ok(None),
            };
            let mut service_names = Vec::new();
            if let Some(spec) = ingress.spec {
                if let Some(name) = spec.default_backend.and_then(|b| b.service).map(|s| s.name) {
                    service_names.push(name);
                }
                for rule in spec.rules.into_iter().flatten() {
                    let Some(http) = rule.http else { continue };
                    for path in http.paths {
                        if let Some(service) = path.backend.service {
                            service_names.push(service.name);
                        }
                    }
                }
            }
            service_names.sort();
            service_names.dedup();
            Ok(Some(IngressBackends { service_names }))
        }

        async fn service_selector(
            &self,
            namespace: &str,
            service_name: &str,
        ) -> Result<Option<BTreeMap<String, String>>, TransportError> {
            use k8s_openapi::api::core::v1::Service;
            let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
            let service = match api.get_opt(service_name).await.map_err(Self::map_err)? {
                Some(service) => service,
                None => return Ok(None),
            };
            Ok(service.spec.and_then(|spec| spec.selector).map(|selector| selector.into_iter().collect()))
        }
    }
}
