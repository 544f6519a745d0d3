use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use gcp_ssl_exporter::config::{Config, ConfigError, Settings, DEFAULT_CONFIG_FILE};
use gcp_ssl_exporter::gcp::auth::token_source;
use gcp_ssl_exporter::gcp::GcpClient;
use gcp_ssl_exporter::metrics::{prom, server};
use gcp_ssl_exporter::SslCollector;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gcp-ssl-exporter", version, author, about, long_about = None)]
struct Args {
    /// URI path where metrics will be exposed [default: /metrics]
    #[arg(short = 'm', long)]
    metrics_path: Option<String>,

    /// Port to listen on [default: 8888]
    #[arg(long)]
    port: Option<u16>,

    /// GCP project where to fetch certificates from, repeat for several projects
    #[arg(short = 'p', long = "project")]
    projects: Vec<String>,

    /// Only fetch load balancer certificates bound to an HTTPS proxy
    #[arg(long)]
    only_in_use: bool,

    /// Timeout in seconds for each Google API call [default: 30]
    #[arg(long = "timeout")]
    timeout_secs: Option<u64>,

    /// OAuth2 access token, instead of asking the metadata server
    #[arg(long, env = "GCP_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,
}

impl Args {
    fn to_config(&self) -> Config {
        Config::from_cli_args(
            self.metrics_path.clone(),
            self.port,
            self.projects.clone(),
            self.only_in_use.then_some(true),
            self.timeout_secs,
            self.access_token.clone(),
        )
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gcp_ssl_exporter=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.generate_config {
        println!("{}", Config::example_toml());
        return Ok(());
    }

    let settings = load_settings(&args).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    info!(
        "Collecting certificates from projects {:?} (only in use: {})",
        settings.projects, settings.only_in_use
    );

    // The blocking client must exist before the async runtime starts.
    let tokens = token_source(settings.access_token.clone(), settings.timeout)?;
    let client = GcpClient::new(tokens, settings.timeout)?;
    let collector = SslCollector::new(
        Arc::new(client),
        settings.projects.clone(),
        settings.scope(),
    )?;
    prom::register(collector)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime
        .block_on(server::serve(settings.listen_addr(), &settings.metrics_path))
        .map_err(|e| {
            error!("Metrics server failed: {}", e);
            e
        })?;

    Ok(())
}

fn load_settings(args: &Args) -> Result<Settings, ConfigError> {
    let file_config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Config::from_file(DEFAULT_CONFIG_FILE)?,
        None => Config::empty(),
    };

    Config::default()
        .merge_with(file_config)
        .merge_with(args.to_config())
        .resolve()
}
