//! Error types for the certificate collection pipeline.
//!
//! Two layers are distinguished: [`ApiError`] describes a single failed call
//! against a provider endpoint, while [`ExporterError`] is what the fetchers,
//! the aggregator and the certificate parser hand back to their callers.

use thiserror::Error;

/// Failure of one request against a provider REST endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The endpoint answered with a non-success HTTP status
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        /// HTTP status code returned by the provider
        status: u16,
        /// The URL that was requested
        url: String,
        /// Response body, usually a JSON error document
        body: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body could not be decoded into the expected resource
    #[error("unexpected response from {url}: {reason}")]
    Decode {
        /// The URL that was requested
        url: String,
        /// Why decoding failed
        reason: String,
    },

    /// No bearer token could be obtained
    #[error("authentication failed: {reason}")]
    Auth {
        /// Description of the credential failure
        reason: String,
    },

    /// The request URL could not be built
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Error type for a collection cycle.
///
/// Every variant except [`ExporterError::Emission`] aborts the cycle that
/// produced it.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// No PEM block could be decoded from the provider value
    #[error("PEM not parsed: {reason}")]
    MalformedInput {
        /// Description of what went wrong
        reason: String,
    },

    /// A PEM block was decoded but its body is not an X.509 certificate
    #[error("Certificate error: {details}")]
    CertificateParse {
        /// The underlying OpenSSL error
        details: String,
    },

    /// A provider listing or fetch call failed
    #[error("Trying to {operation} [{resource}] in project [{project}]: {source}")]
    Backend {
        /// What was being attempted, e.g. "list certificates"
        operation: String,
        /// The resource the call was about
        resource: String,
        /// The project the call was made against
        project: String,
        /// The failed API call
        #[source]
        source: ApiError,
    },

    /// An observation could not be turned into a metric sample
    #[error("Failed to emit sample for [{name}] in project [{project}]: {details}")]
    Emission {
        /// Certificate name of the rejected sample
        name: String,
        /// Project of the rejected sample
        project: String,
        /// The underlying metrics library error
        details: String,
    },
}

impl ExporterError {
    /// Wraps an [`ApiError`] with the context of the call that failed.
    pub fn backend(
        operation: impl Into<String>,
        resource: impl Into<String>,
        project: impl Into<String>,
        source: ApiError,
    ) -> Self {
        Self::Backend {
            operation: operation.into(),
            resource: resource.into(),
            project: project.into(),
            source,
        }
    }
}

impl From<openssl::error::ErrorStack> for ExporterError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::CertificateParse {
            details: e.to_string(),
        }
    }
}

impl From<pem::PemError> for ExporterError {
    fn from(e: pem::PemError) -> Self {
        Self::MalformedInput {
            reason: e.to_string(),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = ExporterError> = std::result::Result<T, E>;
