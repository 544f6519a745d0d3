//! Google Cloud resources the exporter reads, and the API seams it reads them through.
//!
//! # Submodules
//!
//! - `auth` - bearer token sources
//! - `client` - blocking REST client implementing [`ComputeApi`] and [`SqlAdminApi`]

pub mod auth;
pub mod client;

use serde::Deserialize;

use crate::error::ApiError;

pub use auth::{MetadataServerToken, StaticToken, TokenSource};
pub use client::GcpClient;

/// A Compute Engine SSL certificate resource.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslCertificate {
    pub name: String,
    /// PEM chain, leaf first. Empty while a managed certificate is provisioning.
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub self_link: Option<String>,
}

/// A Compute Engine target HTTPS proxy.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetHttpsProxy {
    pub name: String,
    /// Resource URIs of the certificates served by this proxy.
    #[serde(default)]
    pub ssl_certificates: Vec<String>,
}

/// A Cloud SQL instance.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInstance {
    pub name: String,
}

/// A Cloud SQL per-instance SSL certificate.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslCert {
    #[serde(default)]
    pub instance: String,
    #[serde(default)]
    pub common_name: String,
    #[serde(default)]
    pub cert: String,
}

/// One page of a list call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Load balancer certificate and proxy endpoints.
pub trait ComputeApi {
    /// Every SSL certificate uploaded to the project.
    fn list_ssl_certificates(&self, project: &str) -> Result<Vec<SslCertificate>, ApiError>;

    /// Every target HTTPS proxy of the project.
    fn list_target_https_proxies(&self, project: &str)
        -> Result<Vec<TargetHttpsProxy>, ApiError>;

    /// One SSL certificate by name.
    fn get_ssl_certificate(&self, project: &str, name: &str)
        -> Result<SslCertificate, ApiError>;
}

/// Managed database endpoints.
pub trait SqlAdminApi {
    /// Every database instance of the project.
    fn list_instances(&self, project: &str) -> Result<Vec<DatabaseInstance>, ApiError>;

    /// SSL certificates issued for one instance.
    fn list_ssl_certs(&self, project: &str, instance: &str) -> Result<Vec<SslCert>, ApiError>;
}

/// Everything the aggregator needs from the provider.
pub trait CertificateBackend: ComputeApi + SqlAdminApi {}

impl<T: ComputeApi + SqlAdminApi + ?Sized> CertificateBackend for T {}
