//! Wire model of the Kibana `/api/status` response.
//!
//! Only the fields exported as gauges are modelled. Every field is optional:
//! absent or `null` numbers decode to zero, absent or `null` groups to their
//! defaults and status labels to `None`. Anything that should be an object
//! but is not (the document itself included) is a decode error.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// One decoded status document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct KibanaStatus {
    pub status: ServiceStatus,
    pub metrics: KibanaMetrics,
}

impl TryFrom<Map<String, Value>> for KibanaStatus {
    type Error = serde_json::Error;

    fn try_from(mut document: Map<String, Value>) -> Result<Self, Self::Error> {
        Ok(Self {
            status: document
                .remove("status")
                .map_or(Ok(ServiceStatus::default()), object_or_null)?,
            metrics: document
                .remove("metrics")
                .map_or(Ok(KibanaMetrics::default()), object_or_null)?,
        })
    }
}

/// Overall and per-subsystem health levels.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceStatus {
    #[serde(deserialize_with = "object_or_null")]
    pub overall: StatusLevel,
    #[serde(deserialize_with = "object_or_null")]
    pub core: CoreStatus,
}

/// Core subsystems reported under `status.core`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoreStatus {
    #[serde(deserialize_with = "object_or_null")]
    pub elasticsearch: StatusLevel,
    #[serde(rename = "savedObjects", deserialize_with = "object_or_null")]
    pub saved_objects: StatusLevel,
}

/// A single `{ "level": "..." }` entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatusLevel {
    pub level: Option<String>,
}

impl StatusLevel {
    pub fn label(&self) -> Option<&str> {
        self.level.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KibanaMetrics {
    #[serde(deserialize_with = "null_as_default")]
    pub concurrent_connections: u64,
    #[serde(deserialize_with = "object_or_null")]
    pub process: ProcessMetrics,
    #[serde(deserialize_with = "object_or_null")]
    pub os: OsMetrics,
    #[serde(deserialize_with = "object_or_null")]
    pub response_times: ResponseTimes,
    #[serde(deserialize_with = "object_or_null")]
    pub requests: RequestCounters,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessMetrics {
    #[serde(deserialize_with = "null_as_default")]
    pub uptime_in_millis: f64,
    #[serde(deserialize_with = "object_or_null")]
    pub memory: ProcessMemory,
    /// Event loop delay in milliseconds.
    #[serde(deserialize_with = "null_as_default")]
    pub event_loop_delay: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessMemory {
    #[serde(deserialize_with = "object_or_null")]
    pub heap: HeapMemory,
    #[serde(deserialize_with = "null_as_default")]
    pub resident_set_size_in_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeapMemory {
    #[serde(deserialize_with = "null_as_default")]
    pub total_in_bytes: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub used_in_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OsMetrics {
    #[serde(deserialize_with = "object_or_null")]
    pub load: LoadAverage,
    #[serde(deserialize_with = "object_or_null")]
    pub memory: OsMemory,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadAverage {
    #[serde(rename = "1m", deserialize_with = "null_as_default")]
    pub one: f64,
    #[serde(rename = "5m", deserialize_with = "null_as_default")]
    pub five: f64,
    #[serde(rename = "15m", deserialize_with = "null_as_default")]
    pub fifteen: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OsMemory {
    #[serde(deserialize_with = "null_as_default")]
    pub total_in_bytes: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub used_in_bytes: u64,
}

/// Response time statistics. Kibana reports `null` before the first request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResponseTimes {
    #[serde(deserialize_with = "null_as_default")]
    pub avg_in_millis: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub max_in_millis: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestCounters {
    #[serde(deserialize_with = "null_as_default")]
    pub disconnects: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a group that must be a JSON object; `null` yields the default.
///
/// Derived struct visitors also accept sequences, which would turn `[]` into
/// an all-zero group.
fn object_or_null<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    match Option::<Map<String, Value>>::deserialize(deserializer)? {
        Some(object) => serde_json::from_value(Value::Object(object)).map_err(de::Error::custom),
        None => Ok(T::default()),
    }
}
