//! Caller intent for a single discovery call.

use serde::{Deserialize, Serialize};

/// Caller intent for a single [`discover`](crate::discoverer::Discoverer::discover) call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    /// Target namespaces, in caller order. Empty means "discover all accessible namespaces".
    pub namespaces: Vec<String>,
    /// Request the opaque image-metadata side output from [`discover_with_images`](crate::discoverer::Discoverer::discover_with_images).
    pub with_images: bool,
    /// Whether discovered resources must pass the RBAC probe before entering the plan.
    pub rbac_check: bool,
    /// Bound on dependency-expansion rounds. `0` bypasses the resolver entirely.
    pub max_depth: u32,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            with_images: true,
            rbac_check: true,
            max_depth: 3,
        }
    }
}
