//! Data types used by the disruption cost pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analyzers::utility::parse_timestamp;

/// Severity label used when a record carries none, and the fallback key
/// looked up in the severity delay map.
pub const UNDEFINED_SEVERITY: &str = "Undefined";

/// A disruption as reported by the feed, read leniently from raw JSON.
///
/// Missing or wrongly-typed fields become `None` (or an empty list); nothing
/// here can fail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisruptionRecord {
    pub severity: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub description: Option<String>,
    /// One entry per listed line; an entry without a usable `id` is `None`.
    pub lines: Vec<Option<String>>,
}

impl DisruptionRecord {
    pub fn from_value(item: &Value) -> Self {
        let lines = item["lines"]
            .as_array()
            .map(|lines| lines.iter().map(|ln| value_as_id(&ln["id"])).collect())
            .unwrap_or_default();

        Self {
            severity: item["severity"].as_str().map(str::to_string),
            start_time: parse_timestamp(&item["startTime"]),
            end_time: parse_timestamp(&item["endTime"]),
            last_modified: parse_timestamp(&item["lastModified"]),
            description: item["description"].as_str().map(str::to_string),
            lines,
        }
    }
}

/// One row per (disruption, affected line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDisruptionRow {
    #[serde(rename = "lineId")]
    pub line_id: Option<String>,
    pub severity: String,
    #[serde(rename = "startTime")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(rename = "endTime")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<DateTime<Utc>>,
    pub description: String,
}

/// A normalized row as persisted by `ingest`, stamped with the snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDisruptionRow {
    #[serde(rename = "lineId")]
    pub line_id: Option<String>,
    pub severity: String,
    #[serde(rename = "startTime")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(rename = "endTime")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<DateTime<Utc>>,
    pub description: String,
    pub snapshot_utc: DateTime<Utc>,
}

impl StoredDisruptionRow {
    pub fn new(row: NormalizedDisruptionRow, snapshot_utc: DateTime<Utc>) -> Self {
        Self {
            line_id: row.line_id,
            severity: row.severity,
            start_time: row.start_time,
            end_time: row.end_time,
            last_modified: row.last_modified,
            description: row.description,
            snapshot_utc,
        }
    }
}

/// A single live arrival prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalPrediction {
    pub stop_id: Option<String>,
    pub time_to_station_secs: Option<f64>,
}

impl ArrivalPrediction {
    /// Reads `naptanId` and `timeToStation` from a raw arrival record.
    pub fn from_value(item: &Value) -> Self {
        let time_to_station_secs = match &item["timeToStation"] {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|secs| secs.is_finite());

        Self {
            stop_id: value_as_id(&item["naptanId"]),
            time_to_station_secs,
        }
    }
}

/// Result of a headway estimate for one line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeadwayEstimate {
    pub minutes: f64,
    /// `true` when no usable gap existed and the fixed fallback was returned.
    pub fallback: bool,
    /// Number of gaps that survived outlier filtering.
    pub gaps_used: usize,
}

/// Hourly cost of the disruptions affecting one (line, severity) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRow {
    #[serde(rename = "lineId")]
    pub line_id: String,
    pub severity: String,
    pub delay_min_per_bus: f64,
    pub headway_min: f64,
    pub incidents: u32,
    pub cost_per_hour_gbp: f64,
    pub last_seen: Option<DateTime<Utc>>,
}

/// A row type with a fixed column set, in serialized field order.
pub trait Tabular {
    const COLUMNS: &'static [&'static str];
}

impl Tabular for NormalizedDisruptionRow {
    const COLUMNS: &'static [&'static str] = &[
        "lineId",
        "severity",
        "startTime",
        "endTime",
        "lastModified",
        "description",
    ];
}

impl Tabular for StoredDisruptionRow {
    const COLUMNS: &'static [&'static str] = &[
        "lineId",
        "severity",
        "startTime",
        "endTime",
        "lastModified",
        "description",
        "snapshot_utc",
    ];
}

impl Tabular for CostRow {
    const COLUMNS: &'static [&'static str] = &[
        "lineId",
        "severity",
        "delay_min_per_bus",
        "headway_min",
        "incidents",
        "cost_per_hour_gbp",
        "last_seen",
    ];
}

/// Headline figures for a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostSummary {
    pub active_disruptions: usize,
    pub lines_impacted: usize,
    pub total_cost_per_hour_gbp: f64,
}

/// Line ids appear as strings ("55") but occasionally as bare numbers.
fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
