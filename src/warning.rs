//! Structured, returned warnings — the replacement for ad-hoc `Warning:` prints.

use serde::{Deserialize, Serialize};

/// One non-fatal failure absorbed during a discovery call: a dropped
/// resource, an unreachable namespace, a malformed spec, an unparseable
/// selector. Returned alongside the [`Plan`](crate::plan::Plan) rather than
/// printed, so callers can render or discard them as they see fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Which stage produced the warning, e.g. `"scanner"`, `"rbac"`, `"resolver"`.
    pub source: String,
    /// Human-readable description.
    pub message: String,
}

impl Warning {
    /// Construct a warning tagged with its originating stage.
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }
}
