//! Headway estimation from live arrival predictions.
//!
//! Predictions are grouped per stop, differenced in arrival order, filtered
//! for noise and missed-bus gaps, then pooled. The median of the pool,
//! clamped to the configured bounds, is the line's headway.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::analyzers::types::{ArrivalPrediction, HeadwayEstimate};
use crate::analyzers::utility::median;

/// Returned when no usable gap can be derived.
pub const FALLBACK_HEADWAY_MINUTES: f64 = 8.0;

/// Gaps shorter than this are near-duplicate predictions.
const MIN_GAP_MINUTES: f64 = 0.5;

/// Gaps longer than `max_minutes` times this span a missed bus.
const MAX_GAP_FACTOR: f64 = 1.5;

/// Estimates a typical headway in minutes for one line's raw arrivals.
pub fn estimate_headway(arrivals: &[Value], min_minutes: f64, max_minutes: f64) -> f64 {
    estimate_headway_detailed(arrivals, min_minutes, max_minutes).minutes
}

/// Like [`estimate_headway`], also reporting whether the fallback was used and
/// how many gaps fed the median.
pub fn estimate_headway_detailed(
    arrivals: &[Value],
    min_minutes: f64,
    max_minutes: f64,
) -> HeadwayEstimate {
    let predictions: Vec<ArrivalPrediction> =
        arrivals.iter().map(ArrivalPrediction::from_value).collect();

    let has_eta = predictions.iter().any(|p| p.time_to_station_secs.is_some());
    let has_stop = predictions.iter().any(|p| p.stop_id.is_some());
    if !has_eta || !has_stop {
        return fallback();
    }

    let gaps: Vec<f64> = etas_by_stop(&predictions)
        .into_values()
        .flat_map(|etas| stop_gaps(etas, max_minutes))
        .collect();

    let Some(mid) = median(&gaps) else {
        return fallback();
    };

    debug!(gaps = gaps.len(), median = mid, "Headway gaps pooled");

    HeadwayEstimate {
        minutes: mid.min(max_minutes).max(min_minutes),
        fallback: false,
        gaps_used: gaps.len(),
    }
}

/// Arrival times in minutes, keyed by stop. Predictions missing either field
/// are skipped.
fn etas_by_stop(predictions: &[ArrivalPrediction]) -> HashMap<&str, Vec<f64>> {
    let mut groups: HashMap<&str, Vec<f64>> = HashMap::new();
    for p in predictions {
        if let (Some(stop), Some(secs)) = (p.stop_id.as_deref(), p.time_to_station_secs) {
            groups.entry(stop).or_default().push(secs / 60.0);
        }
    }
    groups
}

/// Consecutive gaps between sorted arrival times at one stop, outliers removed.
fn stop_gaps(mut etas: Vec<f64>, max_minutes: f64) -> Vec<f64> {
    if etas.len() < 2 {
        return Vec::new();
    }
    etas.sort_by(f64::total_cmp);

    let upper = max_minutes * MAX_GAP_FACTOR;
    etas.windows(2)
        .map(|w| w[1] - w[0])
        .filter(|gap| (MIN_GAP_MINUTES..=upper).contains(gap))
        .collect()
}

fn fallback() -> HeadwayEstimate {
    HeadwayEstimate {
        minutes: FALLBACK_HEADWAY_MINUTES,
        fallback: true,
        gaps_used: 0,
    }
}
