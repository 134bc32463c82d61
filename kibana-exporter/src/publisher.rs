//! Publisher that owns the Kibana gauges and refreshes them on every pull.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use parking_lot::RwLock;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::mapping::{KibanaGauge, build_metric_name, sanitize_metric_name};
use crate::model::KibanaStatus;
use crate::scraper::Scraper;

/// Identity of one exported gauge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaugeDesc {
    /// Which Kibana value this gauge carries.
    pub gauge: KibanaGauge,
    /// Full metric name, including the namespace.
    pub name: String,
    /// Static help text.
    pub help: &'static str,
}

/// One gauge value emitted by a collect cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<'a> {
    pub desc: &'a GaugeDesc,
    pub value: f64,
}

/// The gauges and the registry they are exposed through.
///
/// Only ever touched while holding the publisher lock.
#[derive(Debug)]
struct GaugeSet {
    registry: Registry,
    /// Gauges in [`KibanaGauge::ALL`] order.
    gauges: Vec<Gauge<f64, AtomicU64>>,
    scrapes: Counter,
    scrape_errors: Counter,
    last_scrape_success: Gauge,
}

impl GaugeSet {
    fn new(namespace: &str) -> Self {
        let mut registry = Registry::with_prefix(namespace);

        let gauges = KibanaGauge::ALL
            .iter()
            .map(|gauge| {
                let metric = Gauge::<f64, AtomicU64>::default();
                registry.register(gauge.name(), gauge.help(), metric.clone());
                metric
            })
            .collect();

        let scrapes: Counter = Counter::default();
        registry.register(
            "exporter_scrapes",
            "Number of scrapes of the Kibana status API",
            scrapes.clone(),
        );
        let scrape_errors: Counter = Counter::default();
        registry.register(
            "exporter_scrape_errors",
            "Number of failed scrapes of the Kibana status API",
            scrape_errors.clone(),
        );
        let last_scrape_success: Gauge = Gauge::default();
        registry.register(
            "exporter_last_scrape_success",
            "Whether the last scrape of the Kibana status API succeeded",
            last_scrape_success.clone(),
        );

        Self {
            registry,
            gauges,
            scrapes,
            scrape_errors,
            last_scrape_success,
        }
    }

    fn apply(&self, status: &KibanaStatus) {
        for (gauge, metric) in KibanaGauge::ALL.iter().zip(&self.gauges) {
            metric.set(gauge.value_from(status));
        }
    }

    fn samples<'a>(&self, descs: &'a [GaugeDesc]) -> Vec<Sample<'a>> {
        descs
            .iter()
            .zip(&self.gauges)
            .map(|(desc, metric)| Sample {
                desc,
                value: metric.get(),
            })
            .collect()
    }
}

/// Publisher statistics.
#[derive(Debug, Clone, Default)]
pub struct PublisherStats {
    /// Total collect cycles run.
    pub scrapes: u64,
    /// Cycles whose scrape failed.
    pub scrape_errors: u64,
    /// Whether the most recent cycle succeeded.
    pub last_scrape_ok: bool,
    /// When the most recent successful cycle finished.
    pub last_success: Option<Instant>,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
}

/// Publishes the Kibana status as Prometheus gauges.
///
/// Each [`collect`](Self::collect) or [`render`](Self::render) call scrapes
/// Kibana once. Calls are serialized by a single lock held across the scrape,
/// so readers always see the gauges of one complete scrape.
pub struct Publisher {
    namespace: String,
    scraper: Scraper,
    descs: Vec<GaugeDesc>,
    gauges: Mutex<GaugeSet>,
    stats: RwLock<PublisherStats>,
}

impl Publisher {
    /// Create a publisher for the given namespace.
    ///
    /// The namespace is trimmed and must not be empty. Characters that are
    /// not valid in a metric name are replaced with underscores.
    pub fn new(namespace: &str, scraper: Scraper) -> Result<Self, ConfigError> {
        let namespace = namespace.trim();
        if namespace.is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        let sanitized = sanitize_metric_name(namespace);
        let namespace = sanitized.as_str();

        let descs = KibanaGauge::ALL
            .iter()
            .map(|&gauge| GaugeDesc {
                gauge,
                name: build_metric_name(namespace, gauge.name()),
                help: gauge.help(),
            })
            .collect();

        Ok(Self {
            namespace: namespace.to_string(),
            scraper,
            descs,
            gauges: Mutex::new(GaugeSet::new(namespace)),
            stats: RwLock::new(PublisherStats::default()),
        })
    }

    /// The trimmed and sanitized namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The scraper used for every cycle.
    pub fn scraper(&self) -> &Scraper {
        &self.scraper
    }

    /// Identities of every gauge, in collection order. Does not scrape.
    pub fn describe(&self) -> &[GaugeDesc] {
        &self.descs
    }

    /// Scrape Kibana and return the refreshed gauge values.
    ///
    /// On a failed scrape nothing is published: the result is empty and the
    /// gauges keep their previous values.
    pub async fn collect(&self) -> Vec<Sample<'_>> {
        let gauges = self.gauges.lock().await;
        if !self.refresh(&gauges).await {
            return Vec::new();
        }
        gauges.samples(&self.descs)
    }

    /// Current gauge values without scraping.
    pub async fn values(&self) -> Vec<Sample<'_>> {
        let gauges = self.gauges.lock().await;
        gauges.samples(&self.descs)
    }

    /// Run one cycle outside of a pull, such as the startup reachability check.
    ///
    /// Gauges and stats are updated exactly as by [`collect`](Self::collect),
    /// so readiness reflects the result before the first pull arrives.
    pub async fn prime(&self) -> bool {
        let gauges = self.gauges.lock().await;
        self.refresh(&gauges).await
    }

    /// Scrape Kibana and render the registry in the OpenMetrics text format.
    ///
    /// After a failed scrape the previous values are rendered.
    pub async fn render(&self) -> Result<String, std::fmt::Error> {
        let gauges = self.gauges.lock().await;
        self.refresh(&gauges).await;

        let mut output = String::new();
        encode(&mut output, &gauges.registry)?;
        Ok(output)
    }

    /// Get publisher statistics.
    pub fn stats(&self) -> PublisherStats {
        self.stats.read().clone()
    }

    /// Run one scrape and fold the result into the gauges.
    async fn refresh(&self, gauges: &GaugeSet) -> bool {
        gauges.scrapes.inc();

        match self.scraper.scrape().await {
            Ok(status) => {
                gauges.apply(&status);
                gauges.last_scrape_success.set(1);

                let mut stats = self.stats.write();
                stats.scrapes += 1;
                stats.last_scrape_ok = true;
                stats.last_success = Some(Instant::now());
                debug!(url = %self.scraper.url(), "Updated Kibana gauges");
                true
            }
            Err(e) => {
                gauges.scrape_errors.inc();
                gauges.last_scrape_success.set(0);
                warn!(
                    url = %self.scraper.url(),
                    kind = e.kind(),
                    error = %e,
                    "Error while scraping metrics from Kibana"
                );

                let mut stats = self.stats.write();
                stats.scrapes += 1;
                stats.scrape_errors += 1;
                stats.last_scrape_ok = false;
                stats.last_error = Some(e.to_string());
                false
            }
        }
    }
}

/// Create a shareable publisher handle.
pub type SharedPublisher = Arc<Publisher>;
