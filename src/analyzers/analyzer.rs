use crate::analyzers::aggregate::aggregate_costs;
use crate::analyzers::headway::estimate_headway_detailed;
use crate::analyzers::normalize::normalize;
use crate::analyzers::summary::summarize;
use crate::analyzers::types::{CostRow, CostSummary, HeadwayEstimate, NormalizedDisruptionRow};
use crate::infra::config::AppConfig;
use crate::services::feed_api::TransitFeedApi;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, warn};

/// Everything computed by one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub disruptions: Vec<NormalizedDisruptionRow>,
    pub headways: BTreeMap<String, HeadwayEstimate>,
    pub costs: Vec<CostRow>,
    pub summary: CostSummary,
}

/// Sorted union of the watchlist and every line named by a disruption.
pub fn lines_to_estimate(watchlist: &[String], disruptions: &[NormalizedDisruptionRow]) -> Vec<String> {
    let lines: BTreeSet<&str> = watchlist
        .iter()
        .map(String::as_str)
        .chain(disruptions.iter().filter_map(|d| d.line_id.as_deref()))
        .collect();
    lines.into_iter().map(str::to_string).collect()
}

/// Fetches disruptions, estimates a headway per affected or watched line, and
/// prices every (line, severity) pair.
///
/// Arrivals are fetched concurrently, at most `concurrency` at a time. A feed
/// that fails is treated as having no data.
#[tracing::instrument(skip(api, config, watchlist), fields(watchlist = watchlist.len()))]
pub async fn run_pipeline<A>(
    api: Arc<A>,
    config: &AppConfig,
    watchlist: &[String],
    concurrency: usize,
) -> Result<PipelineOutput>
where
    A: TransitFeedApi + 'static,
{
    let raw_disruptions = api.bus_disruptions().await.unwrap_or_else(|e| {
        warn!(error = %e, "Disruptions unavailable, continuing with none");
        Vec::new()
    });
    let disruptions = normalize(&raw_disruptions);
    info!(
        records = raw_disruptions.len(),
        rows = disruptions.len(),
        "Disruptions normalized"
    );

    let line_ids = lines_to_estimate(watchlist, &disruptions);
    let headways = estimate_headways(api, config, line_ids, concurrency).await?;

    let headway_minutes: HashMap<String, f64> = headways
        .iter()
        .map(|(line_id, est)| (line_id.clone(), est.minutes))
        .collect();

    let costs = aggregate_costs(
        &disruptions,
        &headway_minutes,
        &config.delays.severity_to_delay_minutes,
        config.costs.cost_per_bus_minute_gbp,
    );
    let summary = summarize(&disruptions, &costs);

    Ok(PipelineOutput {
        disruptions,
        headways,
        costs,
        summary,
    })
}

async fn estimate_headways<A>(
    api: Arc<A>,
    config: &AppConfig,
    line_ids: Vec<String>,
    concurrency: usize,
) -> Result<BTreeMap<String, HeadwayEstimate>>
where
    A: TransitFeedApi + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let min = config.headway.min_headway_minutes;
    let max = config.headway.max_headway_minutes;

    let mut tasks = Vec::with_capacity(line_ids.len());

    for line_id in line_ids {
        let sem = semaphore.clone();
        let api = api.clone();
        let span = tracing::info_span!("estimate_headway", line_id = %line_id);

        let task = tokio::spawn(
            async move {
                let arrivals: Vec<Value> = {
                    let _permit = sem.acquire().await?;
                    api.line_arrivals(&line_id).await.unwrap_or_else(|e| {
                        warn!(error = %e, "Arrivals unavailable, estimating from none");
                        Vec::new()
                    })
                };
                let est = estimate_headway_detailed(&arrivals, min, max);
                debug!(
                    arrivals = arrivals.len(),
                    headway_min = est.minutes,
                    fallback = est.fallback,
                    "Headway estimated"
                );
                anyhow::Ok((line_id, est))
            }
            .instrument(span),
        );

        tasks.push(task);
    }

    let mut headways = BTreeMap::new();
    for task in tasks {
        let (line_id, est) = task.await??;
        headways.insert(line_id, est);
    }

    Ok(headways)
}
