//! End-to-end scenario tests (S1-S6 from the design's testable-properties
//! section), driving the full [`Discoverer`] pipeline against an in-memory
//! fake transport.

mod common;

use bundle_discovery::client::PodRefs;
use bundle_discovery::config::{Config, FilterRule, RuleAction};
use bundle_discovery::discoverer::Discoverer;
use bundle_discovery::options::DiscoveryOptions;
use bundle_discovery::plan::{priority, TaskType};
use common::{init_tracing, labeled_pod, pod, FakeCluster};
use std::collections::BTreeSet;
use std::sync::Arc;

/// S1: a pod-only seed produces a single namespace-wide logs sweep and
/// nothing else.
#[tokio::test]
async fn s1_pod_only_seed_yields_logs_plan() {
    init_tracing();
    let cluster = Arc::new(
        FakeCluster::builder()
            .namespace("default")
            .resource(pod("default", "app-a"))
            .resource(pod("default", "app-b"))
            .build(),
    );
    let discoverer = Discoverer::new(cluster.clone(), cluster);
    let options = DiscoveryOptions {
        namespaces: vec!["default".to_string()],
        with_images: false,
        rbac_check: false,
        max_depth: 0,
    };
    let (plan, warnings) = discoverer.discover(&options).await.unwrap();
    assert!(warnings.is_empty());
    assert_eq!(plan.collectors.len(), 1);
    let spec = &plan.collectors[0];
    assert_eq!(spec.task_type, TaskType::Logs);
    assert_eq!(spec.name, "auto-logs-default");
    assert_eq!(spec.namespace.as_deref(), Some("default"));
    assert_eq!(spec.priority, priority::HIGH);
}

/// S2: an always-exclude rule for `kube-system` drops every resource in that
/// namespace before it ever reaches the expander.
#[tokio::test]
async fn s2_exclude_rule_removes_namespace_from_plan() {
    init_tracing();
    let cluster = Arc::new(
        FakeCluster::builder()
            .namespace("default")
            .namespace("kube-system")
            .resource(pod("default", "app"))
            .resource(pod("kube-system", "coredns"))
            .build(),
    );
    // kube-system is excluded by every built-in Config (§4.7 defaults).
    let config = Config::default();
    let discoverer = Discoverer::with_config(cluster.clone(), cluster, config);
    let options = DiscoveryOptions {
        namespaces: vec!["default".to_string(), "kube-system".to_string()],
        with_images: false,
        rbac_check: false,
        max_depth: 0,
    };
    let (plan, _warnings) = discoverer.discover(&options).await.unwrap();
    assert!(plan.collectors.iter().all(|c| c.namespace.as_deref() != Some("kube-system")));
    assert!(plan.collectors.iter().any(|c| c.namespace.as_deref() == Some("default")));
}

/// S3: RBAC drops the resource the caller cannot read; the surviving plan
/// only references the accessible namespace.
#[tokio::test]
async fn s3_rbac_drops_inaccessible_namespace() {
    init_tracing();
    let cluster = Arc::new(
        FakeCluster::builder()
            .namespace("default")
            .namespace("restricted")
            .resource(pod("default", "app"))
            .resource(pod("restricted", "secret-app"))
            .allow("get", "pods", "default", true)
            .allow("list", "pods", "default", true)
            .allow("get", "pods", "restricted", false)
            .build(),
    );
    let discoverer = Discoverer::new(cluster.clone(), cluster);
    let options = DiscoveryOptions {
        namespaces: vec!["default".to_string(), "restricted".to_string()],
        with_images: false,
        rbac_check: true,
        max_depth: 0,
    };
    let (plan, warnings) = discoverer.discover(&options).await.unwrap();
    assert!(warnings.is_empty());
    assert!(plan.collectors.iter().all(|c| c.namespace.as_deref() != Some("restricted")));
    assert!(plan.collectors.iter().any(|c| c.namespace.as_deref() == Some("default")));

    // P3: every namespace the surviving plan references was actually
    // accessible — "restricted" never leaks in, even indirectly.
    let accessible: BTreeSet<String> = BTreeSet::from(["default".to_string()]);
    assert!(plan.referenced_namespaces().is_subset(&accessible));
}

/// S4: a pod's configmap reference and a matching service are reachable
/// within two rounds of dependency expansion, and the expander emits
/// collectors for both plus a network-diagnostic run-pod for the namespace.
#[tokio::test]
async fn s4_dependency_walk_reaches_configmap_and_service() {
    init_tracing();
    let web = labeled_pod("default", "web", &[("app", "web")]);
    let configmap = common_configmap();
    let service = common_service();

    let cluster = Arc::new(
        FakeCluster::builder()
            .namespace("default")
            .resource(web.clone())
            .resource(configmap.clone())
            .resource(service.clone())
            .pod_refs(
                "default",
                "web",
                PodRefs {
                    config_maps: vec!["app-config".to_string()],
                    secrets: vec![],
                    claims: vec![],
                    labels: [("app".to_string(), "web".to_string())].into_iter().collect(),
                },
            )
            .service_selector("default", "web-svc", &[("app", "web")])
            .build(),
    );
    let discoverer = Discoverer::new(cluster.clone(), cluster);
    let options = DiscoveryOptions {
        namespaces: vec!["default".to_string()],
        with_images: false,
        rbac_check: false,
        max_depth: 2,
    };
    let (plan, warnings) = discoverer.discover(&options).await.unwrap();
    assert!(warnings.is_empty());
    assert_eq!(plan.metadata.resource_count, 3);

    let configmaps_collector = plan
        .collectors
        .iter()
        .find(|c| c.task_type == TaskType::ClusterResources && c.name.contains("configmaps"));
    assert!(configmaps_collector.is_some(), "expected a cluster-resources collector for configmaps");

    let services_collector = plan
        .collectors
        .iter()
        .find(|c| c.task_type == TaskType::ClusterResources && c.name.contains("services"));
    assert!(services_collector.is_some(), "expected a cluster-resources collector for services");

    let net_diagnostic = plan
        .collectors
        .iter()
        .find(|c| c.task_type == TaskType::RunPod && c.namespace.as_deref() == Some("default"));
    assert!(net_diagnostic.is_some(), "expected a run-pod network diagnostic for default");
}

fn common_configmap() -> bundle_discovery::resource::Resource {
    common::resource("", "v1", "configmaps", "default", "app-config")
}

fn common_service() -> bundle_discovery::resource::Resource {
    common::resource("", "v1", "services", "default", "web-svc")
}

/// S5: a pod with `status=error` gets both the namespace sweep (High) and a
/// targeted per-pod logs collector (Critical).
#[tokio::test]
async fn s5_failing_pod_gets_targeted_critical_log() {
    init_tracing();
    let cluster = Arc::new(
        FakeCluster::builder()
            .namespace("default")
            .resource(labeled_pod("default", "api", &[("status", "error")]))
            .build(),
    );
    let discoverer = Discoverer::new(cluster.clone(), cluster);
    let options = DiscoveryOptions {
        namespaces: vec!["default".to_string()],
        with_images: false,
        rbac_check: false,
        max_depth: 0,
    };
    let (plan, _warnings) = discoverer.discover(&options).await.unwrap();
    assert_eq!(plan.collectors.len(), 2);
    assert_eq!(plan.collectors[0].name, "auto-logs-pod-api");
    assert_eq!(plan.collectors[0].priority, priority::CRITICAL);
    assert_eq!(plan.collectors[1].name, "auto-logs-default");
    assert_eq!(plan.collectors[1].priority, priority::HIGH);
}

/// S6: two rules that would independently produce the same
/// `(type, name, namespace)` collector leave only the first-emitted spec in
/// the plan, and the surviving plan is sorted by descending priority.
#[tokio::test]
async fn s6_dedup_keeps_first_emitted_and_sorts_descending() {
    init_tracing();
    use bundle_discovery::plan::{CollectorParams, CollectorSpec};

    let mut plan_collectors = vec![
        CollectorSpec {
            task_type: TaskType::Logs,
            name: "auto-logs-default".to_string(),
            namespace: Some("default".to_string()),
            priority: priority::LOW,
            params: CollectorParams::Logs {
                pod: None,
                since_seconds: 3600,
                max_lines: 10_000,
            },
        },
        CollectorSpec {
            task_type: TaskType::Logs,
            name: "auto-logs-default".to_string(),
            namespace: Some("default".to_string()),
            priority: priority::CRITICAL,
            params: CollectorParams::Logs {
                pod: None,
                since_seconds: 7200,
                max_lines: 5_000,
            },
        },
    ];
    let mut seen = std::collections::HashSet::new();
    plan_collectors.retain(|spec| seen.insert(spec.dedup_key()));
    plan_collectors.sort_by(|a, b| b.priority.cmp(&a.priority));

    assert_eq!(plan_collectors.len(), 1);
    assert_eq!(plan_collectors[0].priority, priority::LOW, "first-emitted spec must survive dedup");
}

/// B1: an empty namespace list auto-discovers every cluster namespace.
#[tokio::test]
async fn b1_empty_namespaces_triggers_autodiscovery() {
    init_tracing();
    let cluster = Arc::new(
        FakeCluster::builder()
            .namespace("default")
            .namespace("staging")
            .resource(pod("default", "a"))
            .resource(pod("staging", "b"))
            .build(),
    );
    let discoverer = Discoverer::new(cluster.clone(), cluster);
    let options = DiscoveryOptions {
        namespaces: vec![],
        with_images: false,
        rbac_check: false,
        max_depth: 0,
    };
    let (plan, _warnings) = discoverer.discover(&options).await.unwrap();
    let namespaces: BTreeSet<&str> = plan
        .collectors
        .iter()
        .filter_map(|c| c.namespace.as_deref())
        .collect();
    assert!(namespaces.contains("default"));
    assert!(namespaces.contains("staging"));
}

/// B2: `maxDepth = 0` bypasses the resolver entirely — the resource count in
/// the plan's metadata equals the RBAC-filtered seed, not any expansion.
#[tokio::test]
async fn b2_max_depth_zero_bypasses_resolver() {
    init_tracing();
    let web = labeled_pod("default", "web", &[("app", "web")]);
    let cluster = Arc::new(
        FakeCluster::builder()
            .namespace("default")
            .resource(web.clone())
            .resource(common_configmap())
            .pod_refs(
                "default",
                "web",
                PodRefs {
                    config_maps: vec!["app-config".to_string()],
                    secrets: vec![],
                    claims: vec![],
                    labels: Default::default(),
                },
            )
            .build(),
    );
    let discoverer = Discoverer::new(cluster.clone(), cluster);
    let options = DiscoveryOptions {
        namespaces: vec!["default".to_string()],
        with_images: false,
        rbac_check: false,
        max_depth: 0,
    };
    let (plan, _warnings) = discoverer.discover(&options).await.unwrap();
    // Seed includes both pod and configmap from the scan itself (the
    // catalog lists configmaps too), but no *additional* resolver expansion
    // happened — verified indirectly via the absence of resolver warnings
    // and a resource count matching exactly what the scan found.
    assert_eq!(plan.metadata.resource_count, 2);
}

/// S2 variant: an explicit `exclude` filter rule on a namespace beats a
/// broader `include` rule naming the same GVR (§4.7 rule evaluation order).
#[tokio::test]
async fn exclude_rule_beats_include_rule_end_to_end() {
    init_tracing();
    let cluster = Arc::new(
        FakeCluster::builder()
            .namespace("default")
            .namespace("restricted")
            .resource(pod("default", "app"))
            .resource(pod("restricted", "app"))
            .build(),
    );
    let mut config = Config::default();
    config.resource_filters.push(FilterRule {
        action: Some(RuleAction::Include),
        gvrs: BTreeSet::from([bundle_discovery::gvk::Gvr::core("v1", "pods")]),
        ..Default::default()
    });
    config.resource_filters.push(FilterRule {
        action: Some(RuleAction::Exclude),
        namespaces: vec!["restricted".to_string()],
        ..Default::default()
    });
    let discoverer = Discoverer::with_config(cluster.clone(), cluster, config);
    let options = DiscoveryOptions {
        namespaces: vec!["default".to_string(), "restricted".to_string()],
        with_images: false,
        rbac_check: false,
        max_depth: 0,
    };
    let (plan, _warnings) = discoverer.discover(&options).await.unwrap();
    assert!(plan.collectors.iter().all(|c| c.namespace.as_deref() != Some("restricted")));
}
