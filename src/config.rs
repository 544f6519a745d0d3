//! Configuration file management for the exporter.
//!
//! This module handles loading, parsing, and merging configuration from TOML files
//! and command-line arguments. Settings can be specified in multiple places with
//! clear precedence rules.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (gcp-ssl-exporter.toml or specified with --config)
//! 3. Command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! metrics_path = "/metrics"
//! port = 8888
//! projects = ["frontend-prod", "billing-prod"]
//! only_in_use = true
//! timeout_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::fetch::ComputeScope;

/// Configuration file looked up in the working directory when --config is not given.
pub const DEFAULT_CONFIG_FILE: &str = "gcp-ssl-exporter.toml";

/// Raw configuration as read from one source.
///
/// All fields are optional to support partial configuration and merging.
/// Missing values will be filled in by defaults or overridden by CLI arguments.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// URI path where metrics will be exposed
    pub metrics_path: Option<String>,
    /// Port to listen on
    pub port: Option<u16>,
    /// GCP projects to fetch certificates from
    pub projects: Option<Vec<String>>,
    /// Only collect load balancer certificates bound to an HTTPS proxy
    pub only_in_use: Option<bool>,
    /// Timeout for each call to the Google APIs, in seconds
    pub timeout_secs: Option<u64>,
    /// Access token to use instead of the metadata server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Default for Config {
    /// Creates a default configuration.
    ///
    /// # Default Values
    ///
    /// - `metrics_path`: "/metrics"
    /// - `port`: 8888
    /// - `projects`: None (must be provided)
    /// - `only_in_use`: false
    /// - `timeout_secs`: 30
    /// - `access_token`: None (use the metadata server)
    fn default() -> Self {
        Config {
            metrics_path: Some("/metrics".to_string()),
            port: Some(8888),
            projects: None,
            only_in_use: Some(false),
            timeout_secs: Some(30),
            access_token: None,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use gcp_ssl_exporter::config::Config;
    /// let config = Config::from_file("gcp-ssl-exporter.toml")?;
    /// # Ok::<(), gcp_ssl_exporter::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// A configuration with every field unset, the identity for [`Config::merge_with`].
    pub fn empty() -> Self {
        Config {
            metrics_path: None,
            port: None,
            projects: None,
            only_in_use: None,
            timeout_secs: None,
            access_token: None,
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if the `other` config has a value (Some), it overrides
    /// this config's value. If the `other` value is None, keeps the current value.
    ///
    /// # Example
    ///
    /// ```
    /// # use gcp_ssl_exporter::config::Config;
    /// let defaults = Config::default();
    /// let file_config = Config::from_file("config.toml").unwrap_or_else(|_| Config::empty());
    /// let merged = defaults.merge_with(file_config);
    /// assert_eq!(merged.port, Some(8888));
    /// ```
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.metrics_path.is_some() {
            self.metrics_path = other.metrics_path;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.projects.is_some() {
            self.projects = other.projects;
        }
        if other.only_in_use.is_some() {
            self.only_in_use = other.only_in_use;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.access_token.is_some() {
            self.access_token = other.access_token;
        }
        self
    }

    /// Creates a Config from command-line arguments for merging.
    ///
    /// Only provided arguments (Some values) will override other configurations.
    /// An empty project list counts as not provided.
    pub fn from_cli_args(
        metrics_path: Option<String>,
        port: Option<u16>,
        projects: Vec<String>,
        only_in_use: Option<bool>,
        timeout_secs: Option<u64>,
        access_token: Option<String>,
    ) -> Self {
        Config {
            metrics_path,
            port,
            projects: if projects.is_empty() {
                None
            } else {
                Some(projects)
            },
            only_in_use,
            timeout_secs,
            access_token,
        }
    }

    /// Checks the merged configuration and resolves it into [`Settings`].
    ///
    /// # Errors
    ///
    /// `ConfigError::Validation` when no project is configured, the metrics
    /// path is not absolute, or the port or timeout is zero.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let defaults = Config::default().merge_with(self);

        let projects: Vec<String> = defaults
            .projects
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if projects.is_empty() {
            return Err(ConfigError::Validation(
                "at least one project is required".to_string(),
            ));
        }

        let metrics_path = defaults
            .metrics_path
            .unwrap_or_else(|| "/metrics".to_string());
        if !metrics_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "metrics path must start with '/': {}",
                metrics_path
            )));
        }

        let port = defaults.port.unwrap_or(8888);
        if port == 0 {
            return Err(ConfigError::Validation("port must not be 0".to_string()));
        }

        let timeout_secs = defaults.timeout_secs.unwrap_or(30);
        if timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout must be at least one second".to_string(),
            ));
        }

        Ok(Settings {
            metrics_path,
            port,
            projects,
            only_in_use: defaults.only_in_use.unwrap_or(false),
            timeout: Duration::from_secs(timeout_secs),
            access_token: defaults.access_token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Generates an example configuration file in TOML format.
    ///
    /// # Example
    ///
    /// ```
    /// # use gcp_ssl_exporter::config::Config;
    /// let example = Config::example_toml();
    /// println!("{}", example);
    /// ```
    pub fn example_toml() -> String {
        let example = Config {
            metrics_path: Some("/metrics".to_string()),
            port: Some(8888),
            projects: Some(vec![
                "frontend-prod".to_string(),
                "billing-prod".to_string(),
            ]),
            only_in_use: Some(true),
            timeout_secs: Some(30),
            access_token: None,
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Fully resolved settings the exporter runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub metrics_path: String,
    pub port: u16,
    pub projects: Vec<String>,
    pub only_in_use: bool,
    pub timeout: Duration,
    pub access_token: Option<String>,
}

impl Settings {
    /// Address the HTTP endpoint binds to (all interfaces).
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn scope(&self) -> ComputeScope {
        ComputeScope::from(self.only_in_use)
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("IO Error: {0}")]
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    #[error("Validation Error: {0}")]
    Validation(String),
}
