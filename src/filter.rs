//! Declarative predicates selecting which discovered resources survive.

use crate::gvk::Gvr;
use crate::resource::Resource;
use crate::selector::Selector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// A declarative predicate combining an inclusion GVR set, an exclusion GVR
/// set, a label selector, and a substring namespace selector. Any criterion
/// left absent passes everything for that axis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceFilter {
    /// If non-empty, only these GVRs pass.
    #[serde(default)]
    pub include_gvrs: BTreeSet<Gvr>,
    /// GVRs that never pass, regardless of `include_gvrs`.
    #[serde(default)]
    pub exclude_gvrs: BTreeSet<Gvr>,
    /// Raw label-selector expression; unparseable strings are treated as absent.
    #[serde(default)]
    pub label_selector: Option<String>,
    /// Namespace is required to contain this substring.
    #[serde(default)]
    pub namespace_contains: Option<String>,
}

impl ResourceFilter {
    /// The filter that passes every resource.
    pub fn none() -> Self {
        Self::default()
    }

    /// Evaluate the filter against a resource.
    ///
    /// An unparseable label selector does not filter — it is treated as
    /// absent and the caller is expected to log a warning separately, since
    /// this is a pure predicate with no side channel of its own.
    pub fn matches(&self, resource: &Resource) -> bool {
        if !self.exclude_gvrs.is_empty() && self.exclude_gvrs.contains(&resource.gvr) {
            return false;
        }
        if !self.include_gvrs.is_empty() && !self.include_gvrs.contains(&resource.gvr) {
            return false;
        }
        if let Some(raw) = &self.label_selector {
            if let Ok(selector) = Selector::from_str(raw) {
                if !selector.matches(&resource.labels) {
                    return false;
                }
            }
        }
        if let Some(substr) = &self.namespace_contains {
            if !resource.namespace.contains(substr.as_str()) {
                return false;
            }
        }
        true
    }

    /// Whether the label selector on this filter fails to parse. Callers use
    /// this to decide whether to emit a warning before calling [`matches`](Self::matches).
    pub fn has_unparseable_selector(&self) -> bool {
        self.label_selector
            .as_deref()
            .is_some_and(|raw| Selector::from_str(raw).is_err())
    }
}
