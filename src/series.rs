//! Downsampling of telemetry streams into fixed time buckets for charting.
//!
//! Buckets hold the latest sample seen in input order per series key -- this
//! is a deliberate "latest wins" policy, not statistical aggregation. Output
//! is sparse (empty buckets are omitted) and sorted ascending.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{LogRecord, TelemetrySample};

/// Requested charting window. Unrecognized tokens fall back to 24h -- a
/// lenient default, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeRange {
    Hour1,
    Hour6,
    Hour24,
    Day7,
}

impl TimeRange {
    pub fn parse(token: &str) -> TimeRange {
        match token {
            "1h" => TimeRange::Hour1,
            "6h" => TimeRange::Hour6,
            "24h" => TimeRange::Hour24,
            "7d" => TimeRange::Day7,
            other => {
                tracing::debug!(%other, "unrecognized time range, defaulting to 24h");
                TimeRange::Hour24
            }
        }
    }

    /// Bucket width for this window.
    pub fn interval(&self) -> Duration {
        match self {
            TimeRange::Hour1 => Duration::minutes(5),
            TimeRange::Hour6 => Duration::minutes(15),
            TimeRange::Hour24 => Duration::hours(1),
            TimeRange::Day7 => Duration::hours(6),
        }
    }

    /// Lookback span, used as the `since` bound when fetching telemetry.
    pub fn window(&self) -> Duration {
        match self {
            TimeRange::Hour1 => Duration::hours(1),
            TimeRange::Hour6 => Duration::hours(6),
            TimeRange::Hour24 => Duration::hours(24),
            TimeRange::Day7 => Duration::days(7),
        }
    }
}

/// Round a timestamp down to its interval boundary.
pub fn bucket_floor(timestamp: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let width = interval.num_milliseconds();
    let floored = timestamp.timestamp_millis().div_euclid(width) * width;
    DateTime::from_timestamp_millis(floored).unwrap_or(timestamp)
}

/// CPU/memory readings for one host inside one bucket. Sibling fields grow
/// independently: a CPU sample and a memory sample landing in the same
/// bucket both survive.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostUsage {
    pub cpu: Option<f64>,
    pub mem: Option<f64>,
}

/// One device-usage bucket, keyed by host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageBucket {
    pub timestamp: DateTime<Utc>,
    pub hosts: BTreeMap<String, HostUsage>,
}

/// Downsample per-host CPU/memory readings carried on system log records.
/// Records without a host, or with neither reading, contribute nothing.
pub fn aggregate_usage(records: &[LogRecord], range: TimeRange) -> Vec<UsageBucket> {
    let interval = range.interval();
    let mut buckets: BTreeMap<DateTime<Utc>, BTreeMap<String, HostUsage>> = BTreeMap::new();

    for record in records {
        let Some(host) = record.host.as_deref() else {
            continue;
        };
        if record.cpu.is_none() && record.mem.is_none() {
            continue;
        }
        let slot = buckets
            .entry(bucket_floor(record.timestamp, interval))
            .or_default()
            .entry(host.to_string())
            .or_default();
        if let Some(cpu) = record.cpu {
            slot.cpu = Some(cpu);
        }
        if let Some(mem) = record.mem {
            slot.mem = Some(mem);
        }
    }

    buckets
        .into_iter()
        .map(|(timestamp, hosts)| UsageBucket { timestamp, hosts })
        .collect()
}

/// How samples are grouped into series within a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKeying {
    /// One series per host (single-metric streams).
    Host,
    /// One series per `host|metric` (per-disk, per-sensor streams).
    HostMetric,
}

/// The retained sample for one series inside one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    pub host: String,
}

/// One telemetry bucket: series key -> latest sample in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub timestamp: DateTime<Utc>,
    pub series: BTreeMap<String, SeriesPoint>,
}

/// Downsample arbitrary telemetry samples. Host-less samples are dropped
/// (they cannot be attributed to a series); within a (bucket, key) slot the
/// last sample in input order wins regardless of its raw timestamp.
pub fn aggregate_samples(
    samples: &[TelemetrySample],
    range: TimeRange,
    keying: SeriesKeying,
) -> Vec<TimeBucket> {
    let interval = range.interval();
    let mut buckets: BTreeMap<DateTime<Utc>, BTreeMap<String, SeriesPoint>> = BTreeMap::new();

    for sample in samples {
        let Some(host) = sample.host.as_deref() else {
            continue;
        };
        let key = match keying {
            SeriesKeying::Host => host.to_string(),
            SeriesKeying::HostMetric => format!("{}|{}", host, sample.metric),
        };
        buckets
            .entry(bucket_floor(sample.timestamp, interval))
            .or_default()
            .insert(
                key,
                SeriesPoint {
                    value: sample.value,
                    value_type: sample.value_type.clone(),
                    host: host.to_string(),
                },
            );
    }

    buckets
        .into_iter()
        .map(|(timestamp, series)| TimeBucket { timestamp, series })
        .collect()
}
