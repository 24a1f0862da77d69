//! Orchestrates scan → RBAC filter → dependency resolve → expand → sort (C6).

use crate::client::{KubeApi, SpecInspector};
use crate::config::Config;
use crate::error::Error;
use crate::expander::Expander;
use crate::filter::ResourceFilter;
use crate::image::ImageCollector;
use crate::options::DiscoveryOptions;
use crate::plan::{OptionsSummary, Plan, PlanMetadata};
use crate::rbac::RbacProbe;
use crate::resolver::DependencyResolver;
use crate::resource::Resource;
use crate::scanner::NamespaceScanner;
use crate::warning::Warning;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Orchestrates the four core stages against a consumed transport.
pub struct Discoverer {
    scanner: NamespaceScanner,
    rbac: RbacProbe,
    resolver: DependencyResolver,
    expander: Expander,
    config: Option<Config>,
}

impl Discoverer {
    /// Construct a discoverer with the built-in collector-mapping table and
    /// no configuration-driven rule engine attached.
    pub fn new(api: Arc<dyn KubeApi>, inspector: Arc<dyn SpecInspector>) -> Self {
        Self {
            scanner: NamespaceScanner::new(api.clone()),
            rbac: RbacProbe::new(api.clone()),
            resolver: DependencyResolver::new(api, inspector),
            expander: Expander::new(),
            config: None,
        }
    }

    /// Construct a discoverer with a [`Config`] attached: its collector
    /// overrides feed the expander, and its include/exclude rule engine is
    /// applied to every scanned resource in addition to the caller's filter.
    pub fn with_config(api: Arc<dyn KubeApi>, inspector: Arc<dyn SpecInspector>, config: Config) -> Self {
        let overrides = config.collector_overrides.clone();
        Self {
            scanner: NamespaceScanner::new(api.clone()),
            rbac: RbacProbe::new(api.clone()),
            resolver: DependencyResolver::new(api, inspector),
            expander: Expander::with_overrides(overrides),
            config: Some(config),
        }
    }

    fn check_cancelled(token: Option<&CancellationToken>) -> Result<(), Error> {
        if token.is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    async fn discover_inner(
        &self,
        options: &DiscoveryOptions,
        filter: &ResourceFilter,
        cancellation: Option<&CancellationToken>,
    ) -> Result<(Vec<Resource>, Vec<Warning>), Error> {
        Self::check_cancelled(cancellation)?;
        let (mut resources, mut warnings) = self.scanner.scan(&options.namespaces, filter, cancellation).await?;

        if let Some(config) = &self.config {
            resources.retain(|r| config.evaluate(r));
        }

        Self::check_cancelled(cancellation)?;
        if options.rbac_check {
            let mut accessible = Vec::with_capacity(resources.len());
            for resource in resources {
                Self::check_cancelled(cancellation)?;
                match self.rbac.check_access(&resource).await {
                    Ok(true) => accessible.push(resource),
                    Ok(false) => {}
                    Err(err) => {
                        warn!(namespace = %resource.namespace, name = %resource.name, error = %err, "rbac probe failed, dropping resource");
                        warnings.push(Warning::new(
                            "rbac",
                            format!("probe failed for {}/{}: {err}", resource.namespace, resource.name),
                        ));
                    }
                }
            }
            resources = accessible;
        }

        Self::check_cancelled(cancellation)?;
        if options.max_depth > 0 {
            let (expanded, resolver_warnings) = self
                .resolver
                .resolve(resources, options.max_depth, cancellation)
                .await
                .map_err(|_| Error::Cancelled)?;
            resources = expanded;
            warnings.extend(resolver_warnings);
        }

        Ok((resources, warnings))
    }

    fn build_plan(&self, resources: &[Resource], options: &DiscoveryOptions, started_at: Instant) -> Plan {
        let mut collectors = self.expander.expand(resources);
        collectors.sort_by(|a, b| b.priority.cmp(&a.priority));
        let mut seen = std::collections::HashSet::new();
        collectors.retain(|spec| seen.insert(spec.dedup_key()));
        Plan {
            collectors,
            metadata: PlanMetadata {
                timestamp: Utc::now(),
                options_used: OptionsSummary::from(options),
                resource_count: resources.len(),
                duration_seconds: started_at.elapsed().as_secs_f64(),
            },
        }
    }

    /// 1. Scan with an empty filter to seed. 2. RBAC-filter if requested.
    /// 3. Dependency-expand if `max_depth > 0`. 4. Expand to collectors.
    /// 5. Return the sorted, deduplicated plan.
    pub async fn discover(&self, options: &DiscoveryOptions) -> Result<(Plan, Vec<Warning>), Error> {
        info!(namespaces = ?options.namespaces, rbac_check = options.rbac_check, max_depth = options.max_depth, "starting discovery");
        self.discover_cancellable(options, None).await
    }

    /// As [`discover`](Self::discover), honoring a [`CancellationToken`] at
    /// every stage boundary.
    pub async fn discover_cancellable(
        &self,
        options: &DiscoveryOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<(Plan, Vec<Warning>), Error> {
        let started_at = Instant::now();
        let (resources, warnings) = self
            .discover_inner(options, &ResourceFilter::none(), cancellation)
            .await?;
        Ok((self.build_plan(&resources, options, started_at), warnings))
    }

    /// Skips the default catalog: `filter`'s include-GVR list (if non-empty)
    /// gates the scan directly, instead of the built-in catalog table.
    pub async fn discover_with_filter(
        &self,
        options: &DiscoveryOptions,
        filter: &ResourceFilter,
    ) -> Result<(Plan, Vec<Warning>), Error> {
        let started_at = Instant::now();
        let (resources, warnings) = self.discover_inner(options, filter, None).await?;
        Ok((self.build_plan(&resources, options, started_at), warnings))
    }

    /// Runs [`discover`](Self::discover), then invokes `images` with the pod
    /// subset of the resolved resource set. The image result is attached
    /// alongside the plan, unchanged.
    pub async fn discover_with_images<C: ImageCollector>(
        &self,
        options: &DiscoveryOptions,
        images: &C,
    ) -> Result<(Plan, Option<Value>, Vec<Warning>), Error> {
        let started_at = Instant::now();
        let (resources, mut warnings) = self.discover_inner(options, &ResourceFilter::none(), None).await?;
        let plan = self.build_plan(&resources, options, started_at);

        let image_result = if options.with_images {
            let pods: Vec<Resource> = resources.into_iter().filter(|r| r.gvr.resource == "pods").collect();
            match images.collect(&pods).await {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(error = %err, "image collection failed");
                    warnings.push(Warning::new("images", format!("image collection failed: {err}")));
                    None
                }
            }
        } else {
            None
        };
        Ok((plan, image_result, warnings))
    }
}
