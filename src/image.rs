//! The image-metadata collaborator invoked once per plan (consumed, opaque).

use crate::resource::Resource;
use async_trait::async_trait;
use serde_json::Value;

/// Invoked with the pod subset of a discovery's resource set after the plan
/// is built; its result is carried alongside the plan unchanged. The crate
/// treats this entirely as an opaque collaborator — it does not interpret
/// the returned value.
#[async_trait]
pub trait ImageCollector: Send + Sync {
    /// The error type returned for a collection failure.
    type Error: std::fmt::Display + Send + Sync + 'static;

    /// Analyze the given pods and return an opaque, already-JSON-shaped result.
    async fn collect(&self, pods: &[Resource]) -> Result<Value, Self::Error>;
}
