//! Prometheus exporter for the Kibana status API.
//!
//! Every pull of the metrics endpoint scrapes Kibana's `/api/status` once,
//! maps the JSON document onto a fixed set of gauges and renders them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │     Kibana      │<────│    Publisher    │<────│   HTTP Server   │
//! │  (/api/status)  │     │ (scrape + map)  │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! kibana-exporter --kibana.uri http://kibana:5601 --kibana.username elastic
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod error;
pub mod http;
pub mod mapping;
pub mod model;
pub mod publisher;
pub mod scraper;

pub use config::{ConfigError, ExporterConfig, KibanaConfig};
pub use error::ScrapeError;
pub use http::HttpServer;
pub use mapping::{HealthLevel, KibanaGauge};
pub use model::KibanaStatus;
pub use publisher::{GaugeDesc, Publisher, PublisherStats, Sample, SharedPublisher};
pub use scraper::Scraper;
