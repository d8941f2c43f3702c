use serde_json::Value;

use crate::analyzers::types::{DisruptionRecord, NormalizedDisruptionRow, UNDEFINED_SEVERITY};

/// Flattens raw disruption records into one row per (disruption, line).
///
/// A record that names no line still produces a single row with no line id,
/// so region-wide disruptions are counted.
pub fn normalize(raw: &[Value]) -> Vec<NormalizedDisruptionRow> {
    raw.iter()
        .map(DisruptionRecord::from_value)
        .flat_map(|record| normalize_record(&record))
        .collect()
}

/// Normalizes a single, already-parsed record.
pub fn normalize_record(record: &DisruptionRecord) -> Vec<NormalizedDisruptionRow> {
    let severity = record
        .severity
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(UNDEFINED_SEVERITY);
    let description = record.description.as_deref().unwrap_or_default();

    let row = |line_id: Option<String>| NormalizedDisruptionRow {
        line_id,
        severity: severity.to_string(),
        start_time: record.start_time,
        end_time: record.end_time,
        last_modified: record.last_modified,
        description: description.to_string(),
    };

    if record.lines.is_empty() {
        return vec![row(None)];
    }

    record.lines.iter().cloned().map(row).collect()
}
