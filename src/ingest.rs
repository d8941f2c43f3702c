//! Snapshotting the live feeds into the local store, and reading it back.
//!
//! The store directory holds the CSV tables plus raw JSON snapshots named the
//! way [`SampleDirectory`](crate::infra::sample::SampleDirectory) reads them,
//! so an ingested store doubles as an offline source.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

use crate::analyzers::normalize::normalize;
use crate::analyzers::types::{CostRow, StoredDisruptionRow};
use crate::infra::sample::{DISRUPTIONS_FILE, arrivals_file_name};
use crate::output::{append_records, dedup_by_key, log_cost_table, read_records, write_raw_snapshot};
use crate::services::feed_api::TransitFeedApi;

pub const DISRUPTIONS_TABLE: &str = "disruptions.csv";
pub const COSTS_TABLE: &str = "costs.csv";
pub const LATEST_DISRUPTIONS_FILE: &str = "latest_disruptions.json";

/// What one ingestion run wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Rows appended to the disruptions table; `None` when the fetch failed.
    pub disruption_rows: Option<usize>,
    /// Watchlist lines whose arrivals were saved.
    pub arrival_lines: Vec<String>,
}

/// Saves the raw disruption feed, appends its normalized rows to the store,
/// and saves raw arrivals for each watchlist line.
///
/// A failed fetch writes nothing for that feed, so earlier snapshots survive.
#[tracing::instrument(skip(api, store_dir, watchlist), fields(store_dir = %store_dir.display(), lines = watchlist.len()))]
pub async fn ingest<A: TransitFeedApi + ?Sized>(
    api: &A,
    store_dir: &Path,
    watchlist: &[String],
    gzip: bool,
) -> Result<IngestReport> {
    std::fs::create_dir_all(store_dir)?;
    let mut report = IngestReport::default();

    match api.bus_disruptions().await {
        Ok(raw) => {
            write_raw_snapshot(store_dir.join(LATEST_DISRUPTIONS_FILE), &raw, gzip)?;
            // Uncompressed copy under the name the offline source reads.
            write_raw_snapshot(store_dir.join(DISRUPTIONS_FILE), &raw, false)?;

            let snapshot_utc = Utc::now();
            let rows: Vec<StoredDisruptionRow> = normalize(&raw)
                .into_iter()
                .map(|row| StoredDisruptionRow::new(row, snapshot_utc))
                .collect();
            let rows = dedup_by_key(rows, |r| {
                (r.line_id.clone(), r.last_modified, r.description.clone())
            });
            append_records(store_dir.join(DISRUPTIONS_TABLE), &rows)?;
            info!(records = raw.len(), rows = rows.len(), "Disruptions stored");
            report.disruption_rows = Some(rows.len());
        }
        Err(e) => {
            warn!(error = %e, "Disruption fetch failed, keeping previous snapshot");
        }
    }

    for line_id in watchlist {
        let arrivals = match api.line_arrivals(line_id).await {
            Ok(arrivals) => arrivals,
            Err(e) => {
                warn!(line_id = %line_id, error = %e, "Arrivals fetch failed, skipping line");
                continue;
            }
        };
        write_raw_snapshot(store_dir.join(arrivals_file_name(line_id)), &arrivals, false)?;
        report.arrival_lines.push(line_id.clone());
    }

    info!(
        disruptions_stored = report.disruption_rows.is_some(),
        arrival_lines = report.arrival_lines.len(),
        "Ingestion done"
    );
    Ok(report)
}

/// What the store currently holds.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSummary {
    pub disruption_rows: usize,
    pub snapshots: usize,
    pub latest_snapshot: Option<DateTime<Utc>>,
    pub cost_rows: usize,
    /// The costliest stored cost rows, most costly first.
    pub top_costs: Vec<CostRow>,
}

/// Reads the store tables and logs their counts and the `top` costliest rows.
pub fn show(store_dir: &Path, top: usize) -> Result<StoreSummary> {
    let disruptions: Vec<StoredDisruptionRow> = read_records(store_dir.join(DISRUPTIONS_TABLE))?;
    let snapshots: BTreeSet<DateTime<Utc>> = disruptions.iter().map(|d| d.snapshot_utc).collect();

    let mut costs: Vec<CostRow> = read_records(store_dir.join(COSTS_TABLE))?;
    let cost_rows = costs.len();
    costs.sort_by(|a, b| b.cost_per_hour_gbp.total_cmp(&a.cost_per_hour_gbp));
    costs.truncate(top);

    let summary = StoreSummary {
        disruption_rows: disruptions.len(),
        snapshots: snapshots.len(),
        latest_snapshot: snapshots.last().copied(),
        cost_rows,
        top_costs: costs,
    };

    info!(
        rows = summary.disruption_rows,
        snapshots = summary.snapshots,
        latest = ?summary.latest_snapshot,
        "Stored disruptions"
    );
    info!(rows = summary.cost_rows, "Stored cost rows");
    log_cost_table(&summary.top_costs);

    Ok(summary)
}
