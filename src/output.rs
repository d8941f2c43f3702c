//! Output formatting and persistence for pipeline results.
//!
//! Supports logging the result tables, JSON printing, and a CSV-backed
//! append/read store.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::hash::Hash;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::types::{CostRow, CostSummary, HeadwayEstimate, Tabular};

/// Logs one line per cost row, most costly first.
pub fn log_cost_table(rows: &[CostRow]) {
    if rows.is_empty() {
        info!("No line-attributed disruptions to cost");
        return;
    }
    for (rank, row) in rows.iter().enumerate() {
        info!(
            rank = rank + 1,
            line_id = %row.line_id,
            severity = %row.severity,
            incidents = row.incidents,
            delay_min_per_bus = row.delay_min_per_bus,
            headway_min = row.headway_min,
            cost_per_hour_gbp = row.cost_per_hour_gbp,
            last_seen = ?row.last_seen,
            "Cost"
        );
    }
}

/// Logs the headway estimated for each line.
pub fn log_headways(headways: &BTreeMap<String, HeadwayEstimate>) {
    for (line_id, est) in headways {
        info!(
            line_id = %line_id,
            headway_min = %format!("{:.1}", est.minutes),
            fallback = est.fallback,
            gaps = est.gaps_used,
            "Headway"
        );
    }
}

/// Logs the headline figures of a run.
pub fn log_summary(summary: &CostSummary) {
    info!(
        active_disruptions = summary.active_disruptions,
        lines_impacted = summary.lines_impacted,
        total_cost_per_hour_gbp = %format!("£{:.0}", summary.total_cost_per_hour_gbp),
        "Estimated impact"
    );
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends rows to a CSV file.
///
/// Writes headers first if the file is missing or empty, even when `rows`
/// is empty, so the column set is always present.
pub fn append_records<T: Serialize + Tabular>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    let needs_header = std::fs::metadata(path).map_or(true, |meta| meta.len() == 0);
    debug!(path = %path.display(), needs_header, rows = rows.len(), "Appending CSV records");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if needs_header {
        writer.write_record(T::COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Reads every row of a CSV file. A missing file reads as empty.
pub fn read_records<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut rows = Vec::new();

    for result in rdr.deserialize() {
        let record: T = result.with_context(|| format!("Bad row in {}", path.display()))?;
        rows.push(record);
    }

    Ok(rows)
}

/// Keeps the first row for each key, preserving order.
pub fn dedup_by_key<T, K, F>(rows: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    rows.into_iter().filter(|row| seen.insert(key(row))).collect()
}

/// Writes a raw JSON snapshot, gzip-compressed with a `.gz` suffix when asked.
///
/// Returns the path actually written.
pub fn write_raw_snapshot(path: impl AsRef<Path>, value: &impl Serialize, gzip: bool) -> Result<PathBuf> {
    let path = path.as_ref();
    let body = serde_json::to_vec(value)?;

    let (path, contents) = if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body)?;
        let mut gz_path = path.as_os_str().to_owned();
        gz_path.push(".gz");
        (PathBuf::from(gz_path), encoder.finish()?)
    } else {
        (path.to_path_buf(), body)
    };

    std::fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), gzip, "Raw snapshot written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{NormalizedDisruptionRow, StoredDisruptionRow};
    use chrono::{TimeZone, Utc};
    use flate2::read::GzDecoder;
    use serde_json::{Value, json};
    use std::env;
    use std::fs;
    use std::io::Read;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn cost_row(line: &str, cost: f64) -> CostRow {
        CostRow {
            line_id: line.into(),
            severity: "Severe".into(),
            delay_min_per_bus: 10.0,
            headway_min: 4.0,
            incidents: 2,
            cost_per_hour_gbp: cost,
            last_seen: Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_logging_does_not_panic() {
        log_cost_table(&[]);
        log_cost_table(&[cost_row("55", 300.0)]);
        log_headways(&BTreeMap::from([(
            "55".to_string(),
            HeadwayEstimate { minutes: 4.0, fallback: false, gaps_used: 2 },
        )]));
        log_summary(&CostSummary::default());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&[cost_row("55", 300.0)]).unwrap();
    }

    #[test]
    fn test_append_empty_writes_header_only() {
        let path = temp_path("bus_disruption_cost_test_empty.csv");
        let _ = fs::remove_file(&path);

        append_records::<CostRow>(&path, &[]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim_end(), CostRow::COLUMNS.join(","));
        assert!(read_records::<CostRow>(&path).unwrap().is_empty());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_to_zero_byte_file_writes_header() {
        let path = temp_path("bus_disruption_cost_test_zero_byte.csv");
        File::create(&path).unwrap();

        append_records(&path, &[cost_row("55", 300.0)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&CostRow::COLUMNS.join(",")));
        let rows: Vec<CostRow> = read_records(&path).unwrap();
        assert_eq!(rows, vec![cost_row("55", 300.0)]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_writes_header_once_and_reads_back() {
        let path = temp_path("bus_disruption_cost_test_roundtrip.csv");
        let _ = fs::remove_file(&path);

        append_records(&path, &[cost_row("55", 300.0)]).unwrap();
        append_records(&path, &[cost_row("25", 120.5), cost_row("149", 60.0)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.starts_with("lineId")).count();
        assert_eq!(header_count, 1);

        let rows: Vec<CostRow> = read_records(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], cost_row("25", 120.5));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_stored_disruptions_keep_missing_fields() {
        let path = temp_path("bus_disruption_cost_test_disruptions.csv");
        let _ = fs::remove_file(&path);

        let row = StoredDisruptionRow::new(
            NormalizedDisruptionRow {
                line_id: None,
                severity: "Undefined".into(),
                start_time: None,
                end_time: None,
                last_modified: None,
                description: String::new(),
            },
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        );
        append_records(&path, &[row.clone()]).unwrap();

        let rows: Vec<StoredDisruptionRow> = read_records(&path).unwrap();
        assert_eq!(rows, vec![row]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let rows: Vec<CostRow> = read_records(temp_path("bus_disruption_cost_absent.csv")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_dedup_by_key_keeps_first() {
        let rows = vec![("55", 1), ("25", 2), ("55", 3)];
        let deduped = dedup_by_key(rows, |r| r.0);
        assert_eq!(deduped, vec![("55", 1), ("25", 2)]);
    }

    #[test]
    fn test_write_raw_snapshot_plain_and_gzip() {
        let value = json!([{"severity": "Severe"}]);

        let plain = write_raw_snapshot(temp_path("bus_disruption_cost_raw.json"), &value, false).unwrap();
        let read: Value = serde_json::from_str(&fs::read_to_string(&plain).unwrap()).unwrap();
        assert_eq!(read, value);

        let gz = write_raw_snapshot(temp_path("bus_disruption_cost_raw.json"), &value, true).unwrap();
        assert!(gz.to_string_lossy().ends_with(".json.gz"));
        let mut decoded = String::new();
        GzDecoder::new(File::open(&gz).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(serde_json::from_str::<Value>(&decoded).unwrap(), value);

        fs::remove_file(plain).unwrap();
        fs::remove_file(gz).unwrap();
    }
}
