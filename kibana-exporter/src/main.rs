//! Prometheus exporter for Kibana.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use kibana_exporter::config::LogFormat;
use kibana_exporter::{ExporterConfig, HttpServer, Publisher, Scraper};

/// Prometheus exporter for Kibana.
#[derive(Parser, Debug)]
#[command(name = "kibana-exporter")]
#[command(about = "Export the Kibana status API as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, env = "KIBANA_EXPORTER_CONFIG")]
    config: Option<String>,

    /// The Kibana API to fetch metrics from.
    #[arg(long = "kibana.uri", env = "KIBANA_URI")]
    kibana_uri: Option<String>,

    /// The username to use for the Kibana API.
    #[arg(long = "kibana.username", env = "KIBANA_USERNAME")]
    kibana_username: Option<String>,

    /// The password to use for the Kibana API.
    #[arg(long = "kibana.password", env = "KIBANA_PASSWORD", hide_env_values = true)]
    kibana_password: Option<String>,

    /// Skip TLS verification for TLS secured Kibana URLs.
    #[arg(long = "kibana.skip-tls", env = "KIBANA_SKIP_TLS")]
    kibana_skip_tls: bool,

    /// Request timeout in seconds for the Kibana API, 0 disables it.
    #[arg(long = "kibana.timeout-secs", env = "KIBANA_TIMEOUT_SECS")]
    kibana_timeout_secs: Option<u64>,

    /// The address to listen on for HTTP requests (overrides config).
    #[arg(long = "web.listen-address", env = "WEB_LISTEN_ADDRESS")]
    listen: Option<String>,

    /// The path to expose metrics on (overrides config).
    #[arg(long = "web.telemetry-path", env = "WEB_TELEMETRY_PATH")]
    metrics_path: Option<String>,

    /// Metric namespace (overrides config).
    #[arg(long, env = "KIBANA_EXPORTER_NAMESPACE")]
    namespace: Option<String>,

    /// Wait for Kibana to be responsive before starting instead of exiting.
    #[arg(long, env = "KIBANA_EXPORTER_WAIT")]
    wait: bool,

    /// Enable debug logging.
    #[arg(long, env = "KIBANA_EXPORTER_DEBUG")]
    debug: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Apply command line overrides on top of the loaded configuration.
    fn apply(self, config: &mut ExporterConfig) {
        if let Some(uri) = self.kibana_uri {
            config.kibana.uri = uri;
        }
        if let Some(username) = self.kibana_username {
            config.kibana.username = Some(username);
        }
        if let Some(password) = self.kibana_password {
            config.kibana.password = Some(password);
        }
        if self.kibana_skip_tls {
            config.kibana.skip_tls = true;
        }
        if let Some(timeout) = self.kibana_timeout_secs {
            config.kibana.timeout_secs = timeout;
        }
        if let Some(listen) = self.listen {
            config.prometheus.listen = listen;
        }
        if let Some(path) = self.metrics_path {
            config.prometheus.path = path;
        }
        if let Some(namespace) = self.namespace {
            config.prometheus.namespace = namespace;
        }
        if self.wait {
            config.startup.wait_for_connection = true;
        }
        if self.debug {
            config.logging.level = "debug".to_string();
        } else if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

fn init_logging(config: &ExporterConfig) -> anyhow::Result<()> {
    let log_level = config.logging.level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("kibana_exporter={}", log_level).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };
    args.apply(&mut config);

    init_logging(&config)?;
    config.validate()?;

    info!(
        kibana = %config.kibana.uri,
        namespace = %config.prometheus.namespace,
        "Starting Kibana Exporter"
    );

    let scraper = Scraper::new(&config.kibana)?;
    let publisher = Arc::new(Publisher::new(&config.prometheus.namespace, scraper)?);

    // The startup scrape goes through the publisher so /ready reflects it.
    if config.startup.wait_for_connection {
        publisher.scraper().wait_for_connection().await;
        publisher.prime().await;
    } else if !publisher.prime().await {
        anyhow::bail!(
            "Could not connect to Kibana at {}, use --wait to wait for it",
            config.kibana.uri
        );
    }

    // Parse listen address
    let listen_addr = config
        .prometheus
        .listen
        .parse::<SocketAddr>()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(
        publisher.clone(),
        listen_addr,
        config.prometheus.path.clone(),
    );
    let mut http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = &mut http_task => {
            anyhow::bail!("HTTP server exited unexpectedly");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    let stats = publisher.stats();
    info!(
        scrapes = stats.scrapes,
        scrape_errors = stats.scrape_errors,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}
