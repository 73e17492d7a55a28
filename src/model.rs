//! Core record types consumed by the engine.
//!
//! Records are produced by external collectors and are read-only here. The
//! structs below replace the untyped shapes that flow out of the dashboard's
//! datastore: required fields are enforced by the type system at the storage
//! boundary, optional fields stay `Option` so partial telemetry passes
//! through instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed event from a monitored host.
///
/// `name` is free text and may encode the event kind (e.g. "User Login");
/// `action` is an enum-like string set by some collectors. Either can mark a
/// record as a login/logout for session pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub action: Option<String>,
    /// CPU usage percentage, 0-100.
    #[serde(default)]
    pub cpu: Option<f64>,
    /// Memory usage percentage, 0-100.
    #[serde(default)]
    pub mem: Option<f64>,
    #[serde(default)]
    pub command: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Text evaluated by the command matcher for system logs.
    pub fn searchable_text(&self) -> Option<&str> {
        self.command.as_deref()
    }
}

/// One raw authentication-subsystem line.
///
/// `log_entry` is unstructured; host, service, and command are encoded
/// positionally and decoded on demand by [`crate::authlog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthLogRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub log_entry: String,
}

/// One numeric telemetry sample (CPU, memory, a disk, a sensor reading).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    /// Samples without a host cannot be attributed to a series and are
    /// dropped by the aggregator.
    #[serde(default)]
    pub host: Option<String>,
    /// Series name: "cpu", "percent_usage", a disk identifier, a sensor name.
    pub metric: String,
    pub value: f64,
    /// e.g. "temperature" or "voltage" for sensor readings.
    #[serde(default)]
    pub value_type: Option<String>,
}

/// Which log table a match was found against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    System,
    Auth,
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogKind::System => write!(f, "system"),
            LogKind::Auth => write!(f, "auth"),
        }
    }
}
