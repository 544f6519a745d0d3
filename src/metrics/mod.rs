//! Metrics collection and exposition.
//!
//! This module exposes certificate validity to Prometheus, which scrapes it
//! over HTTP.
//!
//! # Submodules
//!
//! - `prom` - the `gcp_ssl_validity_seconds` collector
//! - `server` - the HTTP endpoint serving the default registry

pub mod prom;
pub mod server;
