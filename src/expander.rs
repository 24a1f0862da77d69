//! Maps a closed resource set to a prioritized, deduplicated collector plan (C5).

use crate::config::CollectorOverride;
use crate::gvk::Gvr;
use crate::plan::{priority, CollectorParams, CollectorSpec, TaskType};
use crate::resource::Resource;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One entry of the collector-mapping table: which task type a GVR group
/// produces, and at what base priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorMapping {
    /// The task type this GVR group is collected as.
    pub task_type: TaskType,
    /// Base priority for specs produced from this group.
    pub priority: i32,
}

fn default_mapping(gvr: &Gvr) -> CollectorMapping {
    use TaskType::{ClusterResources, Logs};
    match gvr.resource.as_str() {
        "pods" => CollectorMapping { task_type: Logs, priority: priority::HIGH },
        "events" | "deployments" | "statefulsets" | "daemonsets" => {
            CollectorMapping { task_type: ClusterResources, priority: priority::HIGH }
        }
        "services" | "configmaps" | "secrets" | "persistentvolumeclaims" | "replicasets" | "ingresses"
        | "networkpolicies" | "jobs" | "cronjobs" => CollectorMapping { task_type: ClusterResources, priority: priority::NORMAL },
        _ => CollectorMapping { task_type: ClusterResources, priority: priority::LOW },
    }
}

fn has_label_substring(labels: &BTreeMap<String, String>, key: &str, needles: &[&str]) -> bool {
    labels
        .get(key)
        .map(|v| needles.iter().any(|needle| v.contains(needle)))
        .unwrap_or(false)
}

fn is_likely_failing(labels: &BTreeMap<String, String>) -> bool {
    has_label_substring(labels, "status", &["error"]) || has_label_substring(labels, "app", &["failed"])
}

fn is_stateful(labels: &BTreeMap<String, String>) -> bool {
    has_label_substring(labels, "app", &["database", "cache", "queue", "worker"])
}

fn is_config_heavy(labels: &BTreeMap<String, String>) -> bool {
    has_label_substring(labels, "app", &["nginx", "apache", "database", "redis"])
}

const LOG_WINDOW_SECONDS: u64 = 3600;
const LOG_MAX_LINES: u64 = 10_000;
const EXEC_TIMEOUT_SECONDS: u64 = 30;
const RUN_POD_TIMEOUT_SECONDS: u64 = 60;
const NET_TOOLS_IMAGE: &str = "busybox:net-tools";

/// Translates a closed resource set into an ordered, deduplicated plan of
/// collector tasks. Collector-mapping overrides (C7) take precedence over
/// the built-in defaults above.
#[derive(Debug, Clone, Default)]
pub struct Expander {
    overrides: BTreeMap<Gvr, CollectorOverride>,
}

impl Expander {
    /// Construct an expander with no overrides — purely the built-in table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct an expander whose collector mapping is the built-in table
    /// with these per-GVR overrides layered on top.
    pub fn with_overrides(overrides: BTreeMap<Gvr, CollectorOverride>) -> Self {
        Self { overrides }
    }

    fn mapping_for(&self, gvr: &Gvr) -> CollectorMapping {
        let built_in = default_mapping(gvr);
        self.overrides.get(gvr).map(|over| over.apply(built_in)).unwrap_or(built_in)
    }

    /// Expand `resources` into a sorted, deduplicated collector list.
    pub fn expand(&self, resources: &[Resource]) -> Vec<CollectorSpec> {
        let mut groups: BTreeMap<Gvr, Vec<&Resource>> = BTreeMap::new();
        for r in resources {
            groups.entry(r.gvr.clone()).or_default().push(r);
        }

        let mut specs = Vec::new();
        for (gvr, members) in &groups {
            let mapping = self.mapping_for(gvr);
            match mapping.task_type {
                TaskType::Logs => specs.extend(self.logs_specs(members, mapping.priority)),
                _ => specs.push(self.cluster_resources_spec(gvr, members, mapping.task_type, mapping.priority)),
            }
        }

        specs.extend(self.exec_specs(resources));
        specs.extend(self.copy_specs(resources));
        specs.extend(self.run_pod_specs(&groups));

        let mut seen = HashSet::new();
        specs.retain(|spec| seen.insert(spec.dedup_key()));
        specs.sort_by(|a, b| b.priority.cmp(&a.priority));
        specs
    }

    fn logs_specs(&self, pods: &[&Resource], namespace_priority: i32) -> Vec<CollectorSpec> {
        let mut namespaces: BTreeSet<&str> = BTreeSet::new();
        for pod in pods {
            namespaces.insert(pod.namespace.as_str());
        }
        let mut specs: Vec<CollectorSpec> = namespaces
            .into_iter()
            .map(|ns| CollectorSpec {
                task_type: TaskType::Logs,
                name: format!("auto-logs-{ns}"),
                namespace: Some(ns.to_string()),
                priority: namespace_priority,
                params: CollectorParams::Logs {
                    pod: None,
                    since_seconds: LOG_WINDOW_SECONDS,
                    max_lines: LOG_MAX_LINES,
                },
            })
            .collect();

        for pod in pods {
            if is_likely_failing(&pod.labels) {
                specs.push(CollectorSpec {
                    task_type: TaskType::Logs,
                    name: format!("auto-logs-pod-{}", pod.name),
                    namespace: Some(pod.namespace.clone()),
                    priority: priority::CRITICAL,
                    params: CollectorParams::Logs {
                        pod: Some(pod.name.clone()),
                        since_seconds: LOG_WINDOW_SECONDS,
                        max_lines: LOG_MAX_LINES,
                    },
                });
            }
        }
        specs
    }

    fn cluster_resources_spec(
        &self,
        gvr: &Gvr,
        members: &[&Resource],
        task_type: TaskType,
        base_priority: i32,
    ) -> CollectorSpec {
        let cluster_scoped = members.iter().all(|r| r.namespace.is_empty());
        let namespaces: Vec<String> = if cluster_scoped {
            Vec::new()
        } else {
            members
                .iter()
                .map(|r| r.namespace.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };
        let group_label = if gvr.group.is_empty() { "core" } else { &gvr.group };
        CollectorSpec {
            task_type,
            name: format!("cluster-resources-{group_label}-{}", gvr.resource),
            namespace: None,
            priority: base_priority,
            params: CollectorParams::ClusterResources {
                group: gvr.group.clone(),
                version: gvr.version.clone(),
                resource: gvr.resource.clone(),
                namespaces,
            },
        }
    }

    fn exec_specs(&self, resources: &[Resource]) -> Vec<CollectorSpec> {
        resources
            .iter()
            .filter(|r| r.gvr.resource == "pods" && is_stateful(&r.labels))
            .map(|pod| CollectorSpec {
                task_type: TaskType::Exec,
                name: format!("exec-{}", pod.name),
                namespace: Some(pod.namespace.clone()),
                priority: priority::NORMAL,
                params: CollectorParams::Exec {
                    pod: pod.name.clone(),
                    command: vec!["ps".to_string(), "aux".to_string()],
                    timeout_seconds: EXEC_TIMEOUT_SECONDS,
                },
            })
            .collect()
    }

    fn copy_specs(&self, resources: &[Resource]) -> Vec<CollectorSpec> {
        resources
            .iter()
            .filter(|r| r.gvr.resource == "pods" && is_config_heavy(&r.labels))
            .map(|pod| CollectorSpec {
                task_type: TaskType::Copy,
                name: format!("copy-{}", pod.name),
                namespace: Some(pod.namespace.clone()),
                priority: priority::NORMAL,
                params: CollectorParams::Copy {
                    pod: pod.name.clone(),
                    source_path: "/etc/".to_string(),
                },
            })
            .collect()
    }

    fn run_pod_specs(&self, groups: &BTreeMap<Gvr, Vec<&Resource>>) -> Vec<CollectorSpec> {
        let mut namespaces: BTreeSet<String> = BTreeSet::new();
        for (gvr, members) in groups {
            if gvr.resource == "services" || gvr.group == "networking.k8s.io" {
                for r in members {
                    if !r.namespace.is_empty() {
                        namespaces.insert(r.namespace.clone());
                    }
                }
            }
        }
        namespaces
            .into_iter()
            .map(|ns| CollectorSpec {
                task_type: TaskType::RunPod,
                name: format!("net-diagnostic-{ns}"),
                namespace: Some(ns),
                priority: priority::NORMAL,
                params: CollectorParams::RunPod {
                    image: NET_TOOLS_IMAGE.to_string(),
                    command: vec!["sh".to_string(), "-c".to_string(), "nslookup kubernetes.default && wget -qO- https://kubernetes.default".to_string()],
                    timeout_seconds: RUN_POD_TIMEOUT_SECONDS,
                },
            })
            .collect()
    }
}
