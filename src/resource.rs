//! The discovered identity of a single API object.

use crate::gvk::Gvr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A reference to an owning object, as found in `metadata.ownerReferences`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Kind of the owner, e.g. `ReplicaSet`.
    pub kind: String,
    /// Name of the owner.
    pub name: String,
    /// Whether this is the controlling owner (`controller: true`).
    #[serde(default)]
    pub controller: bool,
}

/// The discovered identity of a single API object: its GVR, namespace, name,
/// labels, and owner references. Immutable once constructed — a discovery
/// call never mutates a [`Resource`] after the scanner produces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// The kind this resource was read from.
    pub gvr: Gvr,
    /// Namespace, empty for cluster-scoped resources.
    #[serde(default)]
    pub namespace: String,
    /// Object name.
    pub name: String,
    /// Labels on the object, as found at discovery time.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Owner references on the object, as found at discovery time.
    #[serde(default)]
    pub owner_references: Vec<OwnerRef>,
}

/// A deduplication / visited-set key for a [`Resource`], independent of its
/// labels and owner references.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Group of the underlying GVR.
    pub group: String,
    /// Version of the underlying GVR.
    pub version: String,
    /// Resource (plural) of the underlying GVR.
    pub resource: String,
    /// Namespace, empty for cluster-scoped resources.
    pub namespace: String,
    /// Object name.
    pub name: String,
}

impl Resource {
    /// Whether this resource lives in a namespace.
    pub fn is_namespaced(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// The deduplication key for this resource: `(group, version, resource, namespace, name)`.
    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            group: self.gvr.group.clone(),
            version: self.gvr.version.clone(),
            resource: self.gvr.resource.clone(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    /// Whether any owner reference names `parent_name` and is tagged as the
    /// controlling owner of kind `parent_kind`.
    pub fn is_owned_by(&self, parent_kind: &str, parent_name: &str) -> bool {
        self.owner_references
            .iter()
            .any(|owner| owner.kind == parent_kind && owner.name == parent_name)
    }
}
