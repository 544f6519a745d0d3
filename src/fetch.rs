//! Resource fetchers: list certificate-bearing resources per project and
//! turn them into [`ProviderCertificate`] records.
//!
//! Both fetchers walk the project list in order and stop at the first failed
//! API call. Nothing fetched before the failure is returned.

use std::collections::HashSet;

use strum_macros::{AsRefStr, Display};
use tracing::debug;

use crate::error::{ExporterError, Result};
use crate::gcp::{ComputeApi, SqlAdminApi, SslCert, SslCertificate};

/// API family a certificate came from. Its string form is the `service` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum ServiceKind {
    /// Compute Engine SSL certificate served by a load balancer
    #[strum(serialize = "compute")]
    LoadBalancer,
    /// Cloud SQL instance server/client certificate
    #[strum(serialize = "cloudsql")]
    Database,
}

/// Which load balancer certificates to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeScope {
    /// Every certificate uploaded to the project
    #[default]
    All,
    /// Only certificates referenced by a target HTTPS proxy
    InUse,
}

impl From<bool> for ComputeScope {
    fn from(only_in_use: bool) -> Self {
        if only_in_use {
            ComputeScope::InUse
        } else {
            ComputeScope::All
        }
    }
}

/// A certificate as returned by the provider, before parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCertificate {
    pub name: String,
    pub project: String,
    pub raw_pem: String,
    pub service: ServiceKind,
}

impl ProviderCertificate {
    fn load_balancer(project: &str, cert: SslCertificate) -> Self {
        ProviderCertificate {
            name: cert.name,
            project: project.to_string(),
            raw_pem: cert.certificate,
            service: ServiceKind::LoadBalancer,
        }
    }

    fn database(project: &str, instance: &str, cert: SslCert) -> Self {
        let instance = if cert.instance.is_empty() {
            instance
        } else {
            cert.instance.as_str()
        };
        ProviderCertificate {
            name: format!("{}-{}", instance, cert.common_name),
            project: project.to_string(),
            raw_pem: cert.cert,
            service: ServiceKind::Database,
        }
    }
}

/// Certificate name from a resource URI: its last path segment.
pub fn certificate_id(uri: &str) -> &str {
    uri.trim_end_matches('/').rsplit('/').next().unwrap_or(uri)
}

/// Load balancer certificates of every project.
pub fn fetch_compute<A>(
    api: &A,
    projects: &[String],
    scope: ComputeScope,
) -> Result<Vec<ProviderCertificate>>
where
    A: ComputeApi + ?Sized,
{
    match scope {
        ComputeScope::All => fetch_compute_all(api, projects),
        ComputeScope::InUse => fetch_compute_in_use(api, projects),
    }
}

fn fetch_compute_all<A>(api: &A, projects: &[String]) -> Result<Vec<ProviderCertificate>>
where
    A: ComputeApi + ?Sized,
{
    let mut certificates = Vec::new();

    for project in projects {
        let certs = api
            .list_ssl_certificates(project)
            .map_err(|e| ExporterError::backend("list certificates", "sslCertificates", project, e))?;
        debug!("Found {} compute certificates in project {}", certs.len(), project);

        certificates.extend(
            certs
                .into_iter()
                .map(|cert| ProviderCertificate::load_balancer(project, cert)),
        );
    }

    Ok(certificates)
}

fn fetch_compute_in_use<A>(api: &A, projects: &[String]) -> Result<Vec<ProviderCertificate>>
where
    A: ComputeApi + ?Sized,
{
    let mut certificates = Vec::new();

    for project in projects {
        let proxies = api.list_target_https_proxies(project).map_err(|e| {
            ExporterError::backend("list httpsProxies", "targetHttpsProxies", project, e)
        })?;

        // a certificate can be bound to several proxies
        let mut seen: HashSet<&str> = HashSet::new();

        for proxy in &proxies {
            for uri in &proxy.ssl_certificates {
                let id = certificate_id(uri);
                if !seen.insert(id) {
                    debug!(
                        "Skipping certificate {} of proxy {}, already collected in project {}",
                        id, proxy.name, project
                    );
                    continue;
                }

                let cert = api.get_ssl_certificate(project, id).map_err(|e| {
                    ExporterError::backend(
                        "get certificate",
                        format!("sslCertificates/{}", id),
                        project,
                        e,
                    )
                })?;
                certificates.push(ProviderCertificate::load_balancer(project, cert));
            }
        }
    }

    Ok(certificates)
}

/// Cloud SQL certificates of every instance of every project.
pub fn fetch_cloudsql<A>(api: &A, projects: &[String]) -> Result<Vec<ProviderCertificate>>
where
    A: SqlAdminApi + ?Sized,
{
    let mut certificates = Vec::new();

    for project in projects {
        let instances = api
            .list_instances(project)
            .map_err(|e| ExporterError::backend("list instances", "instances", project, e))?;

        for instance in &instances {
            let certs = api.list_ssl_certs(project, &instance.name).map_err(|e| {
                ExporterError::backend(
                    "list certificates for instance",
                    format!("instances/{}", instance.name),
                    project,
                    e,
                )
            })?;
            debug!(
                "Found {} certificates for instance {} in project {}",
                certs.len(),
                instance.name,
                project
            );

            certificates.extend(
                certs
                    .into_iter()
                    .map(|cert| ProviderCertificate::database(project, &instance.name, cert)),
            );
        }
    }

    Ok(certificates)
}
