//! Error handling for the discovery pipeline.
//!
//! Per-resource and per-dependency failures never surface here — they are
//! absorbed into the [`Warning`](crate::warning::Warning) side channel. Only
//! the per-stage failures the spec calls fatal (transport outage, an
//! unreadable namespace list, cancellation, invalid configuration) become an
//! [`Error`].

use thiserror::Error;

/// Possible errors from a discovery call.
#[derive(Error, Debug)]
pub enum Error {
    /// The transport (API server) was unreachable, or auth/TLS failed.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// The call was cancelled before completion; partial results were discarded.
    #[error("discovery was cancelled")]
    Cancelled,

    /// The namespace list could not be read while auto-discovering namespaces.
    #[error("failed to list namespaces: {0}")]
    NamespaceListFailed(#[source] TransportError),

    /// A configuration rule was rejected before any API traffic was sent.
    #[error("invalid configuration rule {rule}: {reason}")]
    Configuration {
        /// Name of the offending rule.
        rule: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Failure from [`NamespaceScanner::scan`](crate::scanner::NamespaceScanner::scan):
/// either the namespace-list call failed while auto-discovering (fatal per
/// §4.3), or the scan was cancelled mid-flight (§5) — both collapse into
/// [`Error`] at the `Discoverer` boundary.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A namespace-list call failed while auto-discovering namespaces.
    #[error("failed to list namespaces: {0}")]
    NamespaceList(#[source] TransportError),
    /// The scan was cancelled before or during its fan-out; partial results are discarded.
    #[error("namespace scan was cancelled")]
    Cancelled,
}

impl From<ScanError> for Error {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::NamespaceList(e) => Error::NamespaceListFailed(e),
            ScanError::Cancelled => Error::Cancelled,
        }
    }
}

/// An error surfaced by the consumed [`KubeApi`](crate::client::KubeApi) transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The API server could not be reached, or the connection failed.
    #[error("connection error: {0}")]
    Connection(String),
    /// The server rejected the request for reasons other than authorization
    /// (malformed request, server error, etc).
    #[error("api error: {status} {message}")]
    Api {
        /// HTTP-equivalent status code.
        status: u16,
        /// Server-provided message.
        message: String,
    },
}

/// Convenience alias for results returned by the public discovery entry points.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_stable() {
        let e = Error::Configuration {
            rule: "exclude-kube-system".into(),
            reason: "empty GVR set".into(),
        };
        assert_eq!(
            e.to_string(),
            "invalid configuration rule exclude-kube-system: empty GVR set"
        );
    }
}
