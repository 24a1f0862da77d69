//! Auto-discovers live Kubernetes resources across a set of namespaces,
//! filters them by the caller's effective permissions, expands each survivor
//! into a concrete data-collection task, and emits an ordered plan that a
//! downstream support-bundle engine executes.
//!
//! The pipeline is four stages, each its own module:
//!
//! - [`scanner`] enumerates a built-in catalog of GVRs across a namespace set.
//! - [`rbac`] decides, via a cached probe, what the caller may actually read.
//! - [`resolver`] expands a seed resource set into its transitive closure of
//!   owned and referenced resources, bounded by depth.
//! - [`expander`] maps the closed resource set to a prioritized,
//!   deduplicated [`plan::Plan`] of collector tasks.
//!
//! [`discoverer::Discoverer`] orchestrates the four in order and is the
//! crate's main entry point.
//!
//! # Example
//!
//! ```no_run
//! use bundle_discovery::client::KubeApi;
//! use bundle_discovery::discoverer::Discoverer;
//! use bundle_discovery::options::DiscoveryOptions;
//! use std::sync::Arc;
//!
//! # async fn run(api: Arc<dyn KubeApi>, inspector: Arc<dyn bundle_discovery::client::SpecInspector>) -> Result<(), bundle_discovery::error::Error> {
//! let discoverer = Discoverer::new(api, inspector);
//! let (plan, warnings) = discoverer.discover(&DiscoveryOptions::default()).await?;
//! for warning in &warnings {
//!     eprintln!("{}: {}", warning.source, warning.message);
//! }
//! println!("{} collector tasks planned", plan.collectors.len());
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]

pub mod cache;
pub mod client;
pub mod config;
pub mod discoverer;
pub mod error;
pub mod expander;
pub mod filter;
pub mod gvk;
pub mod image;
pub mod options;
pub mod plan;
pub mod rbac;
pub mod resolver;
pub mod resource;
pub mod scanner;
pub mod selector;
pub mod warning;

pub use discoverer::Discoverer;
pub use error::{Error, Result};
pub use options::DiscoveryOptions;
pub use plan::{CollectorSpec, Plan};
pub use resource::Resource;
pub use warning::Warning;
