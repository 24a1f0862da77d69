//! Group/Version/Resource identity for discovered objects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The REST identity of a Kubernetes kind: `(group, version, resource)`.
///
/// `group` is empty for core API resources (`v1` pods, services, etc).
/// Equality is field-wise, matching how the API server itself distinguishes
/// kinds — there is no structural hashing against a live discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvr {
    /// API group, empty string for the core group.
    pub group: String,
    /// API version, e.g. `v1`, `v1beta1`.
    pub version: String,
    /// Plural resource name, e.g. `pods`, `deployments`.
    pub resource: String,
}

impl Gvr {
    /// Construct from explicit group, version, and plural resource name.
    pub fn new(group: impl Into<String>, version: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// Construct a core-group (`group == ""`) GVR.
    pub fn core(version: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::new("", version, resource)
    }

    /// The `apiVersion` string used on the wire: `group/version`, or just
    /// `version` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Whether this GVR belongs to the core (unnamed) API group.
    pub fn is_core(&self) -> bool {
        self.group.is_empty()
    }
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.resource)
    }
}
