//! Prometheus exporter for the expiry of GCP SSL certificates.
//!
//! On every scrape the exporter lists the SSL certificates of Compute Engine
//! load balancers and of Cloud SQL instances across the configured projects,
//! parses each leaf certificate and reports the seconds left until it
//! expires as `gcp_ssl_validity_seconds{name, project, service}`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use gcp_ssl_exporter::gcp::{GcpClient, StaticToken};
//! use gcp_ssl_exporter::{collect_all, ComputeScope};
//!
//! let client = GcpClient::new(Box::new(StaticToken::new("ya29...")), Duration::from_secs(30))?;
//! let projects = vec!["my-project".to_string()];
//! for observation in collect_all(&client, &projects, ComputeScope::InUse)? {
//!     println!("{} {}", observation.name, observation.seconds_to_expire);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod certificate;
pub mod collector;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gcp;
pub mod metrics;

pub use certificate::{parse_leaf_certificate, LeafCertificate};
pub use collector::{collect_all, Observation};
pub use error::{ApiError, ExporterError};
pub use fetch::{ComputeScope, ProviderCertificate, ServiceKind};
pub use metrics::prom::SslCollector;
