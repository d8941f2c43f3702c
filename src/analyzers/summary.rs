use std::collections::HashSet;

use crate::analyzers::types::{CostRow, CostSummary, NormalizedDisruptionRow};
use crate::analyzers::utility::round2;

/// Headline figures: disruption rows, distinct costed lines, and total hourly cost.
pub fn summarize(disruptions: &[NormalizedDisruptionRow], costs: &[CostRow]) -> CostSummary {
    let lines: HashSet<&str> = costs.iter().map(|c| c.line_id.as_str()).collect();

    CostSummary {
        active_disruptions: disruptions.len(),
        lines_impacted: lines.len(),
        total_cost_per_hour_gbp: round2(costs.iter().map(|c| c.cost_per_hour_gbp).sum()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cost(line: &str, severity: &str, cost: f64) -> CostRow {
        CostRow {
            line_id: line.into(),
            severity: severity.into(),
            delay_min_per_bus: 5.0,
            headway_min: 8.0,
            incidents: 1,
            cost_per_hour_gbp: cost,
            last_seen: None,
        }
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(summarize(&[], &[]), CostSummary::default());
    }

    #[test]
    fn test_counts_distinct_lines_and_sums_cost() {
        let disruptions = vec![
            NormalizedDisruptionRow {
                line_id: None,
                severity: "Minor".into(),
                start_time: None,
                end_time: None,
                last_modified: None,
                description: String::new(),
            };
            3
        ];
        let costs = vec![
            cost("55", "Severe", 300.0),
            cost("55", "Minor", 45.5),
            cost("25", "Minor", 18.25),
        ];

        let summary = summarize(&disruptions, &costs);

        assert_eq!(summary.active_disruptions, 3);
        assert_eq!(summary.lines_impacted, 2);
        assert_eq!(summary.total_cost_per_hour_gbp, 363.75);
    }
}
