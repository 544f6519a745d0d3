use std::collections::HashSet;
use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use tracing::{debug, error, warn};

use crate::collector::{collect_all, Observation};
use crate::error::{ExporterError, Result};
use crate::fetch::ComputeScope;
use crate::gcp::CertificateBackend;

pub const SSL_VALIDITY_SECONDS: &str = "gcp_ssl_validity_seconds";
pub const SSL_VALIDITY_HELP: &str = "Time for an ssl certificate to expire";
pub const SSL_VALIDITY_LABELS: [&str; 3] = ["name", "project", "service"];

/// Provider handle shared by every scrape.
pub type SharedBackend = Arc<dyn CertificateBackend + Send + Sync>;

/// Collector that queries the provider on every scrape.
///
/// Nothing is cached between scrapes: each call to `collect` runs a full
/// collection cycle and builds its samples from scratch.
pub struct SslCollector {
    desc_source: GaugeVec,
    backend: SharedBackend,
    projects: Vec<String>,
    scope: ComputeScope,
}

impl SslCollector {
    pub fn new(
        backend: SharedBackend,
        projects: Vec<String>,
        scope: ComputeScope,
    ) -> prometheus::Result<Self> {
        Ok(SslCollector {
            desc_source: ssl_validity_gauge()?,
            backend,
            projects,
            scope,
        })
    }

    /// One collection cycle, without turning it into samples.
    pub fn observe(&self) -> Result<Vec<Observation>> {
        collect_all(self.backend.as_ref(), &self.projects, self.scope)
    }

    fn emit(&self, observations: &[Observation]) -> Vec<MetricFamily> {
        let gauges = match ssl_validity_gauge() {
            Ok(gauges) => gauges,
            Err(e) => {
                error!("Failed to build {} gauge: {}", SSL_VALIDITY_SECONDS, e);
                return Vec::new();
            }
        };

        let mut emitted = 0;
        let mut label_sets = HashSet::new();
        for observation in observations {
            let labels = (
                observation.name.as_str(),
                observation.project.as_str(),
                observation.service,
            );
            if !label_sets.insert(labels) {
                warn!(
                    "Duplicate {} certificate [{}] in project [{}], only the last one is reported",
                    observation.service, observation.name, observation.project
                );
            }

            match emit_sample(&gauges, observation) {
                Ok(()) => emitted += 1,
                Err(e) => error!("{}", e),
            }
        }

        // an empty family is rejected by the text encoder
        if emitted == 0 {
            return Vec::new();
        }
        gauges.collect()
    }
}

fn ssl_validity_gauge() -> prometheus::Result<GaugeVec> {
    GaugeVec::new(
        Opts::new(SSL_VALIDITY_SECONDS, SSL_VALIDITY_HELP),
        &SSL_VALIDITY_LABELS,
    )
}

fn emit_sample(gauges: &GaugeVec, observation: &Observation) -> Result<()> {
    let labels = [
        observation.name.as_str(),
        observation.project.as_str(),
        observation.service.as_ref(),
    ];
    let gauge = gauges
        .get_metric_with_label_values(&labels)
        .map_err(|e| ExporterError::Emission {
            name: observation.name.clone(),
            project: observation.project.clone(),
            details: e.to_string(),
        })?;
    gauge.set(observation.seconds_to_expire);
    Ok(())
}

impl Collector for SslCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.desc_source.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        match self.observe() {
            Ok(observations) => {
                debug!("Collected {} certificates", observations.len());
                self.emit(&observations)
            }
            Err(e) => {
                error!("{}", e);
                Vec::new()
            }
        }
    }
}

/// Registers the collector with the process-wide default registry.
///
/// Meant to be called once at startup; a second registration of the same
/// metric is rejected by the registry.
pub fn register(collector: SslCollector) -> prometheus::Result<()> {
    prometheus::register(Box::new(collector))
}
