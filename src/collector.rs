//! Aggregation of both certificate sources into metric-ready observations.

use tracing::debug;

use crate::certificate::parse_leaf_certificate;
use crate::error::{ExporterError, Result};
use crate::fetch::{fetch_cloudsql, fetch_compute, ComputeScope, ProviderCertificate, ServiceKind};
use crate::gcp::CertificateBackend;

/// Remaining validity of one certificate at collection time.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub name: String,
    pub project: String,
    pub service: ServiceKind,
    /// `notAfter - now`; zero or negative once expired
    pub seconds_to_expire: f64,
}

/// Runs one collection cycle over every project.
///
/// Load balancer certificates are fetched first, then Cloud SQL ones. The
/// first failed API call or unparseable certificate fails the whole cycle and
/// nothing collected so far is returned.
pub fn collect_all<B>(api: &B, projects: &[String], scope: ComputeScope) -> Result<Vec<Observation>>
where
    B: CertificateBackend + ?Sized,
{
    let compute = fetch_compute(api, projects, scope)?;
    let cloudsql = fetch_cloudsql(api, projects)?;

    compute
        .into_iter()
        .chain(cloudsql)
        .map(to_observation)
        .collect()
}

/// Parses the certificate and measures it against the current clock.
pub fn to_observation(cert: ProviderCertificate) -> Result<Observation> {
    let leaf = parse_leaf_certificate(&cert.raw_pem)
        .map_err(|e| with_certificate_context(e, &cert))?;
    let seconds_to_expire = leaf
        .seconds_to_expire()
        .map_err(|e| with_certificate_context(e, &cert))?;

    debug!(
        "{} {} {} not_after={} seconds_to_expire={}",
        cert.service,
        cert.project,
        cert.name,
        leaf.not_after(),
        seconds_to_expire
    );

    Ok(Observation {
        name: cert.name,
        project: cert.project,
        service: cert.service,
        seconds_to_expire,
    })
}

fn with_certificate_context(err: ExporterError, cert: &ProviderCertificate) -> ExporterError {
    let context = |msg: String| {
        format!(
            "{} certificate [{}] in project [{}]: {}",
            cert.service, cert.name, cert.project, msg
        )
    };
    match err {
        ExporterError::MalformedInput { reason } => ExporterError::MalformedInput {
            reason: context(reason),
        },
        ExporterError::CertificateParse { details } => ExporterError::CertificateParse {
            details: context(details),
        },
        other => other,
    }
}
