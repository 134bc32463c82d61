//! Mapping from the Kibana status document to Prometheus gauge values.

use crate::model::KibanaStatus;

/// Health level reported by Kibana for the overall service and each subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthLevel {
    Available,
    Degraded,
    Unavailable,
    Critical,
}

impl HealthLevel {
    /// Parse a level label, ignoring ASCII case.
    ///
    /// Returns `None` for labels Kibana may emit that have no numeric
    /// meaning here (for example `initializing`).
    pub fn from_label(label: &str) -> Option<Self> {
        [
            HealthLevel::Available,
            HealthLevel::Degraded,
            HealthLevel::Unavailable,
            HealthLevel::Critical,
        ]
        .into_iter()
        .find(|level| level.as_str().eq_ignore_ascii_case(label))
    }

    /// Get the label as reported by Kibana.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Available => "available",
            HealthLevel::Degraded => "degraded",
            HealthLevel::Unavailable => "unavailable",
            HealthLevel::Critical => "critical",
        }
    }

    /// Gauge value for this level.
    pub fn gauge_value(&self) -> f64 {
        match self {
            HealthLevel::Available => 1.0,
            HealthLevel::Degraded => 0.5,
            HealthLevel::Unavailable => 0.25,
            HealthLevel::Critical => 0.0,
        }
    }
}

/// Map an optional level label to a gauge value.
///
/// Absent and unrecognized labels count as critical.
pub fn health_value(label: Option<&str>) -> f64 {
    label
        .and_then(HealthLevel::from_label)
        .map_or(0.0, |level| level.gauge_value())
}

/// The gauges exported for a Kibana instance, in exposition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KibanaGauge {
    Status,
    ElasticsearchStatus,
    SavedObjectsStatus,
    ConcurrentConnections,
    Uptime,
    HeapTotal,
    HeapUsed,
    ResidentSetSize,
    EventLoopDelay,
    Load1m,
    Load5m,
    Load15m,
    OsMemoryTotal,
    OsMemoryUsed,
    ResponseTimeAvg,
    ResponseTimeMax,
    RequestDisconnects,
    RequestTotal,
}

impl KibanaGauge {
    /// Every gauge, in the order they are described and collected.
    pub const ALL: [KibanaGauge; 18] = [
        KibanaGauge::Status,
        KibanaGauge::ElasticsearchStatus,
        KibanaGauge::SavedObjectsStatus,
        KibanaGauge::ConcurrentConnections,
        KibanaGauge::Uptime,
        KibanaGauge::HeapTotal,
        KibanaGauge::HeapUsed,
        KibanaGauge::ResidentSetSize,
        KibanaGauge::EventLoopDelay,
        KibanaGauge::Load1m,
        KibanaGauge::Load5m,
        KibanaGauge::Load15m,
        KibanaGauge::OsMemoryTotal,
        KibanaGauge::OsMemoryUsed,
        KibanaGauge::ResponseTimeAvg,
        KibanaGauge::ResponseTimeMax,
        KibanaGauge::RequestDisconnects,
        KibanaGauge::RequestTotal,
    ];

    /// Metric name without the namespace.
    pub fn name(&self) -> &'static str {
        match self {
            KibanaGauge::Status => "status",
            KibanaGauge::ElasticsearchStatus => "core_elasticsearch_status",
            KibanaGauge::SavedObjectsStatus => "core_savedobjects_status",
            KibanaGauge::ConcurrentConnections => "concurrent_connections",
            KibanaGauge::Uptime => "millis_uptime",
            KibanaGauge::HeapTotal => "heap_max_in_bytes",
            KibanaGauge::HeapUsed => "heap_used_in_bytes",
            KibanaGauge::ResidentSetSize => "resident_set_size_in_bytes",
            KibanaGauge::EventLoopDelay => "event_loop_delay_millis",
            KibanaGauge::Load1m => "os_load_1m",
            KibanaGauge::Load5m => "os_load_5m",
            KibanaGauge::Load15m => "os_load_15m",
            KibanaGauge::OsMemoryTotal => "os_memory_max_in_bytes",
            KibanaGauge::OsMemoryUsed => "os_memory_used_in_bytes",
            KibanaGauge::ResponseTimeAvg => "response_average",
            KibanaGauge::ResponseTimeMax => "response_max",
            KibanaGauge::RequestDisconnects => "requests_disconnects",
            KibanaGauge::RequestTotal => "requests_total",
        }
    }

    /// Static help text.
    pub fn help(&self) -> &'static str {
        match self {
            KibanaGauge::Status => "Kibana overall status",
            KibanaGauge::ElasticsearchStatus => "Kibana Elasticsearch connectivity status",
            KibanaGauge::SavedObjectsStatus => "Kibana saved objects service status",
            KibanaGauge::ConcurrentConnections => "Kibana Concurrent Connections",
            KibanaGauge::Uptime => "Kibana uptime in milliseconds",
            KibanaGauge::HeapTotal => "Kibana Heap maximum in bytes",
            KibanaGauge::HeapUsed => "Kibana Heap usage in bytes",
            KibanaGauge::ResidentSetSize => "Kibana resident set size in bytes",
            KibanaGauge::EventLoopDelay => "Kibana event loop delay in milliseconds",
            KibanaGauge::Load1m => "Kibana load average 1m",
            KibanaGauge::Load5m => "Kibana load average 5m",
            KibanaGauge::Load15m => "Kibana load average 15m",
            KibanaGauge::OsMemoryTotal => "Kibana host memory total in bytes",
            KibanaGauge::OsMemoryUsed => "Kibana host memory usage in bytes",
            KibanaGauge::ResponseTimeAvg => "Kibana average response time in milliseconds",
            KibanaGauge::ResponseTimeMax => "Kibana maximum response time in milliseconds",
            KibanaGauge::RequestDisconnects => "Kibana request disconnections count",
            KibanaGauge::RequestTotal => "Kibana total request count",
        }
    }

    /// Extract this gauge's value from a status document.
    ///
    /// Level labels go through [`health_value`]; numbers are widened to
    /// `f64` as-is.
    pub fn value_from(&self, status: &KibanaStatus) -> f64 {
        let metrics = &status.metrics;
        match self {
            KibanaGauge::Status => health_value(status.status.overall.label()),
            KibanaGauge::ElasticsearchStatus => {
                health_value(status.status.core.elasticsearch.label())
            }
            KibanaGauge::SavedObjectsStatus => {
                health_value(status.status.core.saved_objects.label())
            }
            KibanaGauge::ConcurrentConnections => metrics.concurrent_connections as f64,
            KibanaGauge::Uptime => metrics.process.uptime_in_millis,
            KibanaGauge::HeapTotal => metrics.process.memory.heap.total_in_bytes as f64,
            KibanaGauge::HeapUsed => metrics.process.memory.heap.used_in_bytes as f64,
            KibanaGauge::ResidentSetSize => {
                metrics.process.memory.resident_set_size_in_bytes as f64
            }
            KibanaGauge::EventLoopDelay => metrics.process.event_loop_delay,
            KibanaGauge::Load1m => metrics.os.load.one,
            KibanaGauge::Load5m => metrics.os.load.five,
            KibanaGauge::Load15m => metrics.os.load.fifteen,
            KibanaGauge::OsMemoryTotal => metrics.os.memory.total_in_bytes as f64,
            KibanaGauge::OsMemoryUsed => metrics.os.memory.used_in_bytes as f64,
            KibanaGauge::ResponseTimeAvg => metrics.response_times.avg_in_millis,
            KibanaGauge::ResponseTimeMax => metrics.response_times.max_in_millis,
            KibanaGauge::RequestDisconnects => metrics.requests.disconnects as f64,
            KibanaGauge::RequestTotal => metrics.requests.total as f64,
        }
    }
}

/// Sanitize a namespace to be usable as a Prometheus metric name prefix.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`. Invalid
/// characters become underscores, runs of underscores collapse into one and
/// a leading digit gets an underscore in front of it.
pub fn sanitize_metric_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 1);
    let mut last_was_underscore = false;

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        result.push('_');
        last_was_underscore = true;
    }

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == ':' {
            result.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            // '_' itself and every invalid char
            result.push('_');
            last_was_underscore = true;
        }
    }

    while result.ends_with('_') {
        result.pop();
    }

    if result.is_empty() {
        result.push_str("unnamed");
    }

    result
}

/// Build a full Prometheus metric name from a sanitized namespace and a
/// gauge name.
///
/// Format: `{namespace}_{name}`
pub fn build_metric_name(namespace: &str, name: &str) -> String {
    format!("{}_{}", namespace, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_health_level_case_insensitive() {
        for label in ["AVAILABLE", "available", "Available", "aVaIlAbLe"] {
            assert_eq!(health_value(Some(label)), 1.0, "label {label}");
        }
    }

    #[test]
    fn test_health_level_table() {
        assert_eq!(health_value(Some("available")), 1.0);
        assert_eq!(health_value(Some("degraded")), 0.5);
        assert_eq!(health_value(Some("unavailable")), 0.25);
        assert_eq!(health_value(Some("critical")), 0.0);
        assert_eq!(health_value(Some("Degraded")), 0.5);
        assert_eq!(health_value(Some("UNAVAILABLE")), 0.25);
    }

    #[test]
    fn test_health_level_unknown_and_absent() {
        assert_eq!(health_value(None), 0.0);
        assert_eq!(health_value(Some("")), 0.0);
        assert_eq!(health_value(Some("purple")), 0.0);
        assert_eq!(health_value(Some("initializing")), 0.0);
        // Legacy 7.x colours are not levels.
        assert_eq!(health_value(Some("green")), 0.0);
    }

    #[test]
    fn test_health_level_round_trips_label() {
        for level in [
            HealthLevel::Available,
            HealthLevel::Degraded,
            HealthLevel::Unavailable,
            HealthLevel::Critical,
        ] {
            assert_eq!(HealthLevel::from_label(level.as_str()), Some(level));
        }
        assert_eq!(HealthLevel::from_label("unknown"), None);
    }

    #[test]
    fn test_gauge_names_unique() {
        let names: HashSet<_> = KibanaGauge::ALL.iter().map(|g| g.name()).collect();
        assert_eq!(names.len(), KibanaGauge::ALL.len());
        assert_eq!(names.len(), 18);
    }

    #[test]
    fn test_gauge_names_valid_identifiers() {
        for gauge in KibanaGauge::ALL {
            let name = gauge.name();
            assert!(!name.chars().next().unwrap().is_ascii_digit());
            assert!(
                name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
                "gauge name '{}' contains invalid characters",
                name
            );
            assert!(!gauge.help().is_empty());
        }
    }

    #[test]
    fn test_value_from_status() {
        let json = r#"{
            "status": {
                "overall": { "level": "degraded" },
                "core": { "elasticsearch": { "level": "available" } }
            },
            "metrics": {
                "concurrent_connections": 7,
                "process": { "uptime_in_millis": 1500.5, "event_loop_delay": 3.5,
                             "memory": { "heap": { "total_in_bytes": 2048, "used_in_bytes": 1024 },
                                         "resident_set_size_in_bytes": 4096 } },
                "os": { "load": { "1m": 0.1, "5m": 0.2, "15m": 0.3 },
                        "memory": { "total_in_bytes": 8192, "used_in_bytes": 6144 } },
                "response_times": { "avg_in_millis": 4.5, "max_in_millis": 90 },
                "requests": { "disconnects": 1, "total": 42 }
            }
        }"#;
        let status: KibanaStatus = serde_json::from_str(json).unwrap();

        let expected = [
            (KibanaGauge::Status, 0.5),
            (KibanaGauge::ElasticsearchStatus, 1.0),
            (KibanaGauge::SavedObjectsStatus, 0.0),
            (KibanaGauge::ConcurrentConnections, 7.0),
            (KibanaGauge::Uptime, 1500.5),
            (KibanaGauge::HeapTotal, 2048.0),
            (KibanaGauge::HeapUsed, 1024.0),
            (KibanaGauge::ResidentSetSize, 4096.0),
            (KibanaGauge::EventLoopDelay, 3.5),
            (KibanaGauge::Load1m, 0.1),
            (KibanaGauge::Load5m, 0.2),
            (KibanaGauge::Load15m, 0.3),
            (KibanaGauge::OsMemoryTotal, 8192.0),
            (KibanaGauge::OsMemoryUsed, 6144.0),
            (KibanaGauge::ResponseTimeAvg, 4.5),
            (KibanaGauge::ResponseTimeMax, 90.0),
            (KibanaGauge::RequestDisconnects, 1.0),
            (KibanaGauge::RequestTotal, 42.0),
        ];

        for (gauge, value) in expected {
            assert_eq!(gauge.value_from(&status), value, "gauge {:?}", gauge);
        }
    }

    #[test]
    fn test_large_counters_widen_exactly() {
        let mut status = KibanaStatus::default();
        status.metrics.requests.total = 1 << 52;
        assert_eq!(
            KibanaGauge::RequestTotal.value_from(&status),
            4_503_599_627_370_496.0
        );
    }

    #[test]
    fn test_build_metric_name() {
        assert_eq!(build_metric_name("kibana", "status"), "kibana_status");
        assert_eq!(
            build_metric_name("kibana_prod", "os_load_1m"),
            "kibana_prod_os_load_1m"
        );
    }

    #[test]
    fn test_sanitize_metric_name_valid() {
        assert_eq!(sanitize_metric_name("kibana"), "kibana");
        assert_eq!(sanitize_metric_name("kibana_prod"), "kibana_prod");
        assert_eq!(sanitize_metric_name("team:kibana"), "team:kibana");
    }

    #[test]
    fn test_sanitize_metric_name_special_chars() {
        assert_eq!(sanitize_metric_name("kibana-prod"), "kibana_prod");
        assert_eq!(sanitize_metric_name("kibana.eu-west.1"), "kibana_eu_west_1");
        assert_eq!(sanitize_metric_name("kibana--__prod"), "kibana_prod");
        assert_eq!(sanitize_metric_name("kibana%"), "kibana");
    }

    #[test]
    fn test_sanitize_metric_name_leading_digit() {
        assert_eq!(sanitize_metric_name("1kibana"), "_1kibana");
    }

    #[test]
    fn test_sanitize_metric_name_empty() {
        assert_eq!(sanitize_metric_name("---"), "unnamed");
    }
}
