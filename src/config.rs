//! Three-layer option merge and declarative include/exclude rule evaluation (C7).
//!
//! Loading a `Config` from a file is out of scope — the crate only merges
//! and evaluates one, handed in by a [`ConfigLoader`] the caller supplies.

use crate::expander::CollectorMapping;
use crate::gvk::Gvr;
use crate::options::DiscoveryOptions;
use crate::plan::TaskType;
use crate::resource::Resource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Namespaces excluded by every built-in [`Config`], regardless of overrides.
pub const BUILTIN_EXCLUDED_NAMESPACES: &[&str] = &["kube-system", "kube-public", "kube-node-lease"];

/// Whether a [`FilterRule`] requires or forbids membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleAction {
    /// A non-empty include set makes membership a requirement.
    Include,
    /// An exclude match removes a resource unconditionally.
    Exclude,
}

/// A declarative rule: matches when every criterion it specifies matches,
/// absent criteria are wildcards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRule {
    /// Which direction this rule pushes matching resources.
    pub action: Option<RuleAction>,
    /// GVRs this rule applies to; empty matches any GVR.
    #[serde(default)]
    pub gvrs: BTreeSet<Gvr>,
    /// Namespaces this rule applies to; empty matches any namespace.
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Labels that must all be present and equal on the resource; empty matches any labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl FilterRule {
    fn matches(&self, resource: &Resource) -> bool {
        if !self.gvrs.is_empty() && !self.gvrs.contains(&resource.gvr) {
            return false;
        }
        if !self.namespaces.is_empty() && !self.namespaces.iter().any(|ns| ns == &resource.namespace) {
            return false;
        }
        if !self.labels.is_empty() {
            let all_present = self
                .labels
                .iter()
                .all(|(k, v)| resource.labels.get(k).map(|rv| rv == v).unwrap_or(false));
            if !all_present {
                return false;
            }
        }
        true
    }
}

/// A rule keyed by GVR, namespace, or name (or any combination) that always
/// excludes a match — evaluated before the ordinary include/exclude rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlwaysExcludeRule {
    /// GVR to match, or any GVR if unset.
    #[serde(default)]
    pub gvr: Option<Gvr>,
    /// Namespace to match, or any namespace if unset.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Name to match, or any name if unset.
    #[serde(default)]
    pub name: Option<String>,
}

impl AlwaysExcludeRule {
    fn matches(&self, resource: &Resource) -> bool {
        if let Some(gvr) = &self.gvr {
            if gvr != &resource.gvr {
                return false;
            }
        }
        if let Some(ns) = &self.namespace {
            if ns != &resource.namespace {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if name != &resource.name {
                return false;
            }
        }
        true
    }

    fn namespace_only(ns: &str) -> Self {
        Self {
            gvr: None,
            namespace: Some(ns.to_string()),
            name: None,
        }
    }
}

/// Per-GVR override of the [`Expander`](crate::expander::Expander)'s
/// built-in collector mapping. Fields left `None` fall back to the built-in
/// default for that field.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CollectorOverride {
    /// Override the task type this GVR group produces.
    pub task_type: Option<TaskType>,
    /// Override the base priority this GVR group produces.
    pub priority: Option<i32>,
}

impl CollectorOverride {
    /// Apply this override on top of a built-in mapping.
    pub fn apply(&self, built_in: CollectorMapping) -> CollectorMapping {
        CollectorMapping {
            task_type: self.task_type.unwrap_or(built_in.task_type),
            priority: self.priority.unwrap_or(built_in.priority),
        }
    }
}

/// A partial [`DiscoveryOptions`] overlay — only the fields a file or caller
/// explicitly set. `None` means "not specified," distinct from the zero
/// value of the underlying field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsOverlay {
    /// Overrides `namespaces` if present.
    pub namespaces: Option<Vec<String>>,
    /// Overrides `with_images` if present.
    pub with_images: Option<bool>,
    /// Overrides `rbac_check` if present.
    pub rbac_check: Option<bool>,
    /// Overrides `max_depth` if present.
    pub max_depth: Option<u32>,
}

impl OptionsOverlay {
    fn apply(&self, base: DiscoveryOptions) -> DiscoveryOptions {
        DiscoveryOptions {
            namespaces: self.namespaces.clone().unwrap_or(base.namespaces),
            with_images: self.with_images.unwrap_or(base.with_images),
            rbac_check: self.rbac_check.unwrap_or(base.rbac_check),
            max_depth: self.max_depth.unwrap_or(base.max_depth),
        }
    }
}

/// Built-in defaults, plus the rule lists a file or caller layer on top of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Defaults for [`DiscoveryOptions`] before file/caller overlays are applied.
    pub defaults: DiscoveryOptions,
    /// Resource include/exclude rules, evaluated in list order per action class.
    #[serde(default)]
    pub resource_filters: Vec<FilterRule>,
    /// Per-GVR collector-mapping overrides.
    #[serde(default)]
    pub collector_overrides: BTreeMap<Gvr, CollectorOverride>,
    /// Rules that always exclude a match, evaluated before `resource_filters`.
    #[serde(default)]
    pub always_exclude: Vec<AlwaysExcludeRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: DiscoveryOptions::default(),
            resource_filters: Vec::new(),
            collector_overrides: BTreeMap::new(),
            always_exclude: BUILTIN_EXCLUDED_NAMESPACES
                .iter()
                .map(|ns| AlwaysExcludeRule::namespace_only(ns))
                .collect(),
        }
    }
}

impl Config {
    /// Merge built-in defaults, a file overlay, and a caller overlay, with
    /// precedence caller > file > built-in.
    pub fn merged_options(&self, file: Option<&OptionsOverlay>, caller: Option<&OptionsOverlay>) -> DiscoveryOptions {
        let mut options = self.defaults.clone();
        if let Some(file) = file {
            options = file.apply(options);
        }
        if let Some(caller) = caller {
            options = caller.apply(options);
        }
        options
    }

    /// Evaluate the rule order against a resource: always-exclude rules
    /// first, then ordinary `exclude` rules, then `include` rules (a
    /// non-empty include set makes inclusion required).
    pub fn evaluate(&self, resource: &Resource) -> bool {
        if self.always_exclude.iter().any(|rule| rule.matches(resource)) {
            return false;
        }
        let exclude_rules = self.resource_filters.iter().filter(|r| r.action == Some(RuleAction::Exclude));
        if exclude_rules.clone().any(|rule| rule.matches(resource)) {
            return false;
        }
        let mut include_rules = self.resource_filters.iter().filter(|r| r.action == Some(RuleAction::Include)).peekable();
        if include_rules.peek().is_some() {
            return include_rules.any(|rule| rule.matches(resource));
        }
        true
    }

    /// Look up the collector-mapping override for a GVR, if any.
    pub fn collector_override(&self, gvr: &Gvr) -> Option<CollectorOverride> {
        self.collector_overrides.get(gvr).copied()
    }
}

/// An external, opaque source of [`Config`] values — file/environment
/// loading lives entirely on the caller's side of this trait.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// The error type returned for a load failure.
    type Error: std::fmt::Display + Send + Sync + 'static;

    /// Load a `Config`.
    async fn load(&self) -> Result<Config, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn pod(ns: &str, labels: &[(&str, &str)]) -> Resource {
        Resource {
            gvr: Gvr::core("v1", "pods"),
            namespace: ns.to_string(),
            name: "p".into(),
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<Map<_, _>>(),
            owner_references: Vec::new(),
        }
    }

    #[test]
    fn builtin_namespaces_are_always_excluded() {
        let config = Config::default();
        assert!(!config.evaluate(&pod("kube-system", &[])));
        assert!(config.evaluate(&pod("default", &[])));
    }

    #[test]
    fn exclude_rule_beats_include_rule() {
        // S2-style: an exclude rule for a namespace wins even with a
        // matching include rule present.
        let mut config = Config::default();
        config.resource_filters.push(FilterRule {
            action: Some(RuleAction::Include),
            gvrs: BTreeSet::from([Gvr::core("v1", "pods")]),
            ..Default::default()
        });
        config.resource_filters.push(FilterRule {
            action: Some(RuleAction::Exclude),
            namespaces: vec!["restricted".to_string()],
            ..Default::default()
        });
        assert!(!config.evaluate(&pod("restricted", &[])));
        assert!(config.evaluate(&pod("default", &[])));
    }

    #[test]
    fn non_empty_include_set_requires_membership() {
        let mut config = Config::default();
        config.resource_filters.push(FilterRule {
            action: Some(RuleAction::Include),
            labels: Map::from([("app".to_string(), "web".to_string())]),
            ..Default::default()
        });
        assert!(config.evaluate(&pod("default", &[("app", "web")])));
        assert!(!config.evaluate(&pod("default", &[("app", "other")])));
    }

    #[test]
    fn merge_with_no_overlays_equals_defaults() {
        // L2
        let config = Config::default();
        let merged = config.merged_options(None, None);
        assert_eq!(merged.namespaces, config.defaults.namespaces);
        assert_eq!(merged.with_images, config.defaults.with_images);
        assert_eq!(merged.rbac_check, config.defaults.rbac_check);
        assert_eq!(merged.max_depth, config.defaults.max_depth);
    }

    #[test]
    fn caller_overlay_wins_over_file_overlay() {
        let config = Config::default();
        let file = OptionsOverlay {
            max_depth: Some(1),
            ..Default::default()
        };
        let caller = OptionsOverlay {
            max_depth: Some(5),
            ..Default::default()
        };
        let merged = config.merged_options(Some(&file), Some(&caller));
        assert_eq!(merged.max_depth, 5);
    }

    #[test]
    fn config_round_trips_through_yaml() {
        // The Config shape is what an external file-based ConfigLoader would
        // hand back after parsing YAML; it never touches a file itself, but
        // the shape must actually be YAML-representable.
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.always_exclude.len(), config.always_exclude.len());
        assert_eq!(back.defaults.max_depth, config.defaults.max_depth);
    }

    #[test]
    fn collector_override_fills_in_only_specified_fields() {
        let built_in = CollectorMapping {
            task_type: TaskType::ClusterResources,
            priority: crate::plan::priority::NORMAL,
        };
        let over = CollectorOverride {
            task_type: None,
            priority: Some(crate::plan::priority::CRITICAL),
        };
        let merged = over.apply(built_in);
        assert_eq!(merged.task_type, TaskType::ClusterResources);
        assert_eq!(merged.priority, crate::plan::priority::CRITICAL);
    }
}
