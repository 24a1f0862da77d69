//! The collector plan emitted by a discovery call.

use crate::options::DiscoveryOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// The closed set of collection task types a [`CollectorSpec`] can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    /// Stream or fetch container logs.
    Logs,
    /// Dump the raw manifest(s) of a cluster resource.
    ClusterResources,
    /// Run a command inside a container.
    Exec,
    /// Copy a path out of a container's filesystem.
    Copy,
    /// Spin up a short-lived diagnostic pod.
    RunPod,
}

/// Priority classes, stored as plain integers so configuration-driven rules
/// may interpolate between them.
pub mod priority {
    /// Background collection, no urgency.
    pub const LOW: i32 = 0;
    /// The common case.
    pub const NORMAL: i32 = 1;
    /// Resources likely relevant to the incident under investigation.
    pub const HIGH: i32 = 2;
    /// Targeted at a resource that looks actively broken.
    pub const CRITICAL: i32 = 3;
}

/// Task-type-specific parameters. A tagged variant per [`TaskType`], rather
/// than a runtime-typed string map — the map form survives only as the
/// `parameters` object on the wire, produced by [`CollectorSpec`]'s
/// `Serialize`/`Deserialize` impls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CollectorParams {
    /// Parameters for a [`TaskType::Logs`] spec.
    Logs {
        /// Set when this spec targets one pod rather than a whole namespace.
        pod: Option<String>,
        /// How far back to collect logs, in seconds.
        since_seconds: u64,
        /// Cap on the number of lines collected.
        max_lines: u64,
    },
    /// Parameters for a [`TaskType::ClusterResources`] spec.
    ClusterResources {
        /// API group of the resource being dumped.
        group: String,
        /// API version of the resource being dumped.
        version: String,
        /// Plural resource name.
        resource: String,
        /// Namespaces this group's resources were found in; empty for cluster-scoped kinds.
        namespaces: Vec<String>,
    },
    /// Parameters for a [`TaskType::Exec`] spec.
    Exec {
        /// Target pod name.
        pod: String,
        /// Command to run inside the pod.
        command: Vec<String>,
        /// Timeout in seconds.
        timeout_seconds: u64,
    },
    /// Parameters for a [`TaskType::Copy`] spec.
    Copy {
        /// Target pod name.
        pod: String,
        /// Path to extract from the container filesystem.
        source_path: String,
    },
    /// Parameters for a [`TaskType::RunPod`] spec.
    RunPod {
        /// Container image to run.
        image: String,
        /// Command to run in the diagnostic pod.
        command: Vec<String>,
        /// Timeout in seconds.
        timeout_seconds: u64,
    },
}

/// One task in the emitted plan.
///
/// Two specs with identical `(task_type, name, namespace)` are duplicates;
/// [`crate::expander::Expander`] drops the second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "CollectorSpecWire", try_from = "CollectorSpecWire")]
pub struct CollectorSpec {
    /// The kind of collection task.
    pub task_type: TaskType,
    /// Stable name, unique within `(task_type, namespace)`.
    pub name: String,
    /// Namespace this spec is scoped to, if any.
    pub namespace: Option<String>,
    /// Non-negative priority; higher sorts first.
    pub priority: i32,
    /// Task-type-specific parameters.
    pub params: CollectorParams,
}

impl CollectorSpec {
    /// The `(task_type, name, namespace)` tuple used for deduplication.
    pub fn dedup_key(&self) -> (TaskType, String, Option<String>) {
        (self.task_type, self.name.clone(), self.namespace.clone())
    }
}

/// The flat, serializable wire form described in §6 of the spec: `type`,
/// `name`, `namespace`, `priority`, `parameters`. This is the only shape a
/// downstream consumer (or a round-trip through JSON) ever sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectorSpecWire {
    #[serde(rename = "type")]
    task_type: TaskType,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    priority: i32,
    parameters: Value,
}

impl From<CollectorSpec> for CollectorSpecWire {
    fn from(spec: CollectorSpec) -> Self {
        // `CollectorParams` serializes externally-tagged as `{"Logs": {fields...}}`;
        // the wire `type` field already carries that discriminant via `task_type`,
        // so unwrap down to the inner fields object for the flat `parameters` shape.
        let parameters = match serde_json::to_value(&spec.params).unwrap_or(Value::Null) {
            Value::Object(map) => map.into_values().next().unwrap_or(Value::Null),
            other => other,
        };
        CollectorSpecWire {
            task_type: spec.task_type,
            name: spec.name,
            namespace: spec.namespace,
            priority: spec.priority,
            parameters,
        }
    }
}

impl TryFrom<CollectorSpecWire> for CollectorSpec {
    type Error = serde_json::Error;

    fn try_from(wire: CollectorSpecWire) -> Result<Self, Self::Error> {
        let wrapped = serde_json::json!({ variant_tag_name(wire.task_type): wire.parameters });
        let params: CollectorParams = serde_json::from_value(wrapped)?;
        Ok(CollectorSpec {
            task_type: wire.task_type,
            name: wire.name,
            namespace: wire.namespace,
            priority: wire.priority,
            params,
        })
    }
}

fn variant_tag_name(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Logs => "Logs",
        TaskType::ClusterResources => "ClusterResources",
        TaskType::Exec => "Exec",
        TaskType::Copy => "Copy",
        TaskType::RunPod => "RunPod",
    }
}

/// Metadata describing how a [`Plan`] was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// When the discovery call completed.
    pub timestamp: DateTime<Utc>,
    /// The effective options used, summarized for the wire.
    pub options_used: OptionsSummary,
    /// Number of resources in the closed set the plan was expanded from.
    pub resource_count: usize,
    /// Wall-clock duration of the call, in seconds.
    pub duration_seconds: f64,
}

/// A serializable summary of the [`DiscoveryOptions`] a call used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsSummary {
    /// Target namespaces requested by the caller.
    pub namespaces: Vec<String>,
    /// Whether RBAC filtering was requested.
    pub rbac_check: bool,
    /// The dependency-expansion depth bound used.
    pub max_depth: u32,
}

impl From<&DiscoveryOptions> for OptionsSummary {
    fn from(opts: &DiscoveryOptions) -> Self {
        Self {
            namespaces: opts.namespaces.clone(),
            rbac_check: opts.rbac_check,
            max_depth: opts.max_depth,
        }
    }
}

/// The single structured output of a discovery call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// The ordered, deduplicated collector tasks.
    pub collectors: Vec<CollectorSpec>,
    /// Metadata about how the plan was produced.
    pub metadata: PlanMetadata,
}

impl Plan {
    /// Sort collectors by descending priority, ties broken by the existing
    /// (stable) order — i.e. order of expansion.
    pub fn sort_by_priority(&mut self) {
        self.collectors.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Remove collectors sharing a `(task_type, name, namespace)` tuple with
    /// an earlier one, keeping the first occurrence.
    pub fn dedup(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.collectors.retain(|spec| seen.insert(spec.dedup_key()));
    }

    /// Every namespace referenced by a namespaced collector, for P3
    /// ("every collector's namespace is in the set of accessible
    /// namespaces") checks against the caller's accessible-namespace set.
    pub fn referenced_namespaces(&self) -> BTreeSet<String> {
        self.collectors.iter().filter_map(|c| c.namespace.clone()).collect()
    }
}
