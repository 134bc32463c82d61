//! Configuration for the Kibana exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Namespace cannot be empty")]
    EmptyNamespace,
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Kibana target settings.
    #[serde(default)]
    pub kibana: KibanaConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Startup behaviour.
    #[serde(default)]
    pub startup: StartupConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Kibana target configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KibanaConfig {
    /// Base URL of the Kibana instance (default: "http://localhost:5601").
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Username for basic authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Skip TLS certificate verification for https URLs.
    #[serde(default)]
    pub skip_tls: bool,

    /// Request timeout in seconds, 0 disables it (default: 10).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Request the extended status form (default: true).
    #[serde(default = "default_extended")]
    pub extended: bool,
}

fn default_uri() -> String {
    "http://localhost:5601".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_extended() -> bool {
    true
}

impl Default for KibanaConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            username: None,
            password: None,
            skip_tls: false,
            timeout_secs: default_timeout(),
            extended: default_extended(),
        }
    }
}

impl KibanaConfig {
    /// Create a configuration for the given base URL with default settings.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Request timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:9684").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Metric namespace (default: "kibana").
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_listen() -> String {
    "0.0.0.0:9684".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_namespace() -> String {
    "kibana".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            namespace: default_namespace(),
        }
    }
}

/// Startup configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartupConfig {
    /// Block until Kibana is reachable instead of exiting on failure.
    #[serde(default)]
    pub wait_for_connection: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Paths served by the exporter itself.
const RESERVED_PATHS: [&str; 3] = ["/", "/healthz", "/ready"];

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kibana.uri.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Kibana URI must not be empty".to_string(),
            ));
        }

        if self.prometheus.namespace.trim().is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }

        // Validate listen address format
        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        // Validate path starts with /
        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if RESERVED_PATHS.contains(&self.prometheus.path.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Metrics path {} is reserved",
                self.prometheus.path
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let json = "{}";
        let config = ExporterConfig::parse(json).unwrap();

        assert_eq!(config.kibana.uri, "http://localhost:5601");
        assert_eq!(config.kibana.username, None);
        assert!(!config.kibana.skip_tls);
        assert!(config.kibana.extended);
        assert_eq!(config.kibana.timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.prometheus.listen, "0.0.0.0:9684");
        assert_eq!(config.prometheus.path, "/metrics");
        assert_eq!(config.prometheus.namespace, "kibana");
        assert!(!config.startup.wait_for_connection);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            kibana: {
                uri: "https://kibana.example.com:5601",
                username: "elastic",
                password: "changeme",
                skip_tls: true,
                timeout_secs: 0,
                extended: false
            },
            prometheus: {
                listen: "127.0.0.1:9100",
                path: "/prometheus/metrics",
                namespace: "kibana_prod"
            },
            startup: {
                wait_for_connection: true
            },
            logging: {
                level: "debug",
                format: "json"
            }
        }"#;

        let config = ExporterConfig::parse(json).unwrap();

        assert_eq!(config.kibana.uri, "https://kibana.example.com:5601");
        assert_eq!(config.kibana.username.as_deref(), Some("elastic"));
        assert_eq!(config.kibana.password.as_deref(), Some("changeme"));
        assert!(config.kibana.skip_tls);
        assert_eq!(config.kibana.timeout(), None);
        assert!(!config.kibana.extended);
        assert_eq!(config.prometheus.listen, "127.0.0.1:9100");
        assert_eq!(config.prometheus.path, "/prometheus/metrics");
        assert_eq!(config.prometheus.namespace, "kibana_prod");
        assert!(config.startup.wait_for_connection);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ kibana: {{ uri: 'http://kibana:5601' }} }}").unwrap();

        let config = ExporterConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.kibana.uri, "http://kibana:5601");
    }

    #[test]
    fn test_load_missing_file() {
        let result = ExporterConfig::load_from_file("/nonexistent/kibana-exporter.json5");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_validate_empty_uri() {
        let json = r#"{ kibana: { uri: "  " } }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("URI"));
    }

    #[test]
    fn test_validate_empty_namespace() {
        let json = r#"{ prometheus: { namespace: " \t" } }"#;

        let result = ExporterConfig::parse(json);
        assert!(matches!(result, Err(ConfigError::EmptyNamespace)));
    }

    #[test]
    fn test_validate_invalid_listen() {
        let json = r#"{
            prometheus: { listen: "not-an-address" }
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid listen address")
        );
    }

    #[test]
    fn test_validate_invalid_path() {
        let json = r#"{
            prometheus: { path: "no-leading-slash" }
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must start with /")
        );
    }

    #[test]
    fn test_validate_reserved_path() {
        for path in ["/", "/healthz", "/ready"] {
            let json = format!(r#"{{ prometheus: {{ path: "{}" }} }}"#, path);
            let result = ExporterConfig::parse(&json);
            assert!(
                result.unwrap_err().to_string().contains("reserved"),
                "path {path} should be rejected"
            );
        }
    }
}
