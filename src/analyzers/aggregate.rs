use crate::analyzers::headway::FALLBACK_HEADWAY_MINUTES;
use crate::analyzers::types::{CostRow, NormalizedDisruptionRow, UNDEFINED_SEVERITY};
use crate::analyzers::utility::round2;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Delay per bus used when neither the severity nor `"Undefined"` is mapped.
pub const DEFAULT_DELAY_MINUTES: f64 = 5.0;

/// Looks up the assumed delay per bus for a severity label, falling back to the
/// `"Undefined"` entry and then to [`DEFAULT_DELAY_MINUTES`].
pub fn severity_delay_minutes(severity: &str, severity_map: &HashMap<String, f64>) -> f64 {
    severity_map
        .get(severity)
        .or_else(|| severity_map.get(UNDEFINED_SEVERITY))
        .copied()
        .unwrap_or(DEFAULT_DELAY_MINUTES)
}

/// Cost of one hour of disruption on a line.
///
/// A non-positive (or NaN) headway is treated as the fallback headway.
pub fn disruption_cost_per_hour(delay_per_bus_min: f64, headway_min: f64, cost_per_bus_min: f64) -> f64 {
    let headway_min = usable_headway(headway_min);
    let buses_per_hour = 60.0 / headway_min;
    delay_per_bus_min * buses_per_hour * cost_per_bus_min
}

fn usable_headway(headway_min: f64) -> f64 {
    if headway_min > 0.0 {
        headway_min
    } else {
        FALLBACK_HEADWAY_MINUTES
    }
}

#[derive(Default)]
struct Group {
    incidents: u32,
    last_seen: Option<DateTime<Utc>>,
}

/// Groups normalized disruptions by (line, severity) and prices each group.
///
/// Rows without a line id are dropped. Output is sorted by
/// `cost_per_hour_gbp`, highest first; ties keep (line, severity) order.
pub fn aggregate_costs(
    rows: &[NormalizedDisruptionRow],
    headway_by_line: &HashMap<String, f64>,
    severity_map: &HashMap<String, f64>,
    cost_per_bus_minute: f64,
) -> Vec<CostRow> {
    let mut groups: BTreeMap<(&str, &str), Group> = BTreeMap::new();

    for row in rows {
        let Some(line_id) = row.line_id.as_deref() else {
            continue;
        };
        let group = groups.entry((line_id, row.severity.as_str())).or_default();
        group.incidents += 1;
        group.last_seen = group.last_seen.max(row.last_modified);
    }

    let mut out: Vec<CostRow> = groups
        .into_iter()
        .map(|((line_id, severity), group)| {
            let headway = match headway_by_line.get(line_id) {
                Some(&hw) if hw > 0.0 => hw,
                other => {
                    debug!(
                        line_id,
                        headway = ?other,
                        fallback = FALLBACK_HEADWAY_MINUTES,
                        "Headway missing or non-positive, using fallback"
                    );
                    FALLBACK_HEADWAY_MINUTES
                }
            };
            let delay = severity_delay_minutes(severity, severity_map);
            let cost = disruption_cost_per_hour(delay, headway, cost_per_bus_minute);

            CostRow {
                line_id: line_id.to_string(),
                severity: severity.to_string(),
                delay_min_per_bus: round2(delay),
                headway_min: round2(headway),
                incidents: group.incidents,
                cost_per_hour_gbp: round2(cost),
                last_seen: group.last_seen,
            }
        })
        .collect();

    out.sort_by(|a, b| b.cost_per_hour_gbp.total_cmp(&a.cost_per_hour_gbp));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(line: Option<&str>, severity: &str, last: Option<DateTime<Utc>>) -> NormalizedDisruptionRow {
        NormalizedDisruptionRow {
            line_id: line.map(str::to_string),
            severity: severity.to_string(),
            start_time: None,
            end_time: None,
            last_modified: last,
            description: String::new(),
        }
    }

    fn map(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_two_incidents_same_group() {
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let rows = vec![row(Some("55"), "Severe", Some(t1)), row(Some("55"), "Severe", Some(t2))];

        let out = aggregate_costs(&rows, &map(&[("55", 4.0)]), &map(&[("Severe", 10.0)]), 2.0);

        assert_eq!(
            out,
            vec![CostRow {
                line_id: "55".into(),
                severity: "Severe".into(),
                delay_min_per_bus: 10.0,
                headway_min: 4.0,
                incidents: 2,
                cost_per_hour_gbp: 300.0,
                last_seen: Some(t2),
            }]
        );
    }

    #[test]
    fn test_rows_without_line_are_dropped() {
        let rows = vec![row(None, "Severe", None), row(None, "Minor", None)];
        let out = aggregate_costs(&rows, &HashMap::new(), &map(&[("Severe", 10.0)]), 2.0);
        assert!(out.is_empty());

        assert!(aggregate_costs(&[], &HashMap::new(), &HashMap::new(), 2.0).is_empty());
    }

    #[test]
    fn test_unknown_severity_uses_undefined_entry() {
        let rows = vec![row(Some("25"), "Catastrophic", None)];

        let out = aggregate_costs(&rows, &map(&[("25", 6.0)]), &map(&[("Undefined", 3.0)]), 1.0);
        assert_eq!(out[0].delay_min_per_bus, 3.0);
        assert_eq!(out[0].cost_per_hour_gbp, 30.0);

        let out = aggregate_costs(&rows, &map(&[("25", 6.0)]), &HashMap::new(), 1.0);
        assert_eq!(out[0].delay_min_per_bus, DEFAULT_DELAY_MINUTES);
        assert_eq!(out[0].cost_per_hour_gbp, 50.0);
    }

    #[test]
    fn test_missing_or_invalid_headway_uses_fallback() {
        let rows = vec![row(Some("149"), "Minor", None), row(Some("29"), "Minor", None)];
        let out = aggregate_costs(
            &rows,
            &map(&[("29", 0.0)]),
            &map(&[("Minor", 4.0)]),
            1.0,
        );

        assert_eq!(out.len(), 2);
        for r in &out {
            assert_eq!(r.headway_min, 8.0);
            // 4 * (60 / 8) * 1
            assert_eq!(r.cost_per_hour_gbp, 30.0);
        }
    }

    #[test]
    fn test_sorted_by_cost_descending() {
        let rows = vec![
            row(Some("25"), "Minor", None),
            row(Some("55"), "Severe", None),
            row(Some("149"), "Moderate", None),
            row(Some("55"), "Minor", None),
        ];
        let headways = map(&[("25", 10.0), ("55", 5.0), ("149", 12.0)]);
        let severities = map(&[("Minor", 2.0), ("Moderate", 6.0), ("Severe", 10.0)]);

        let out = aggregate_costs(&rows, &headways, &severities, 1.5);

        assert_eq!(out.len(), 4);
        assert_eq!((out[0].line_id.as_str(), out[0].severity.as_str()), ("55", "Severe"));
        for pair in out.windows(2) {
            assert!(pair[0].cost_per_hour_gbp >= pair[1].cost_per_hour_gbp);
        }
    }

    #[test]
    fn test_last_seen_ignores_missing_timestamps() {
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let rows = vec![row(Some("55"), "Severe", None), row(Some("55"), "Severe", Some(t1))];
        let out = aggregate_costs(&rows, &HashMap::new(), &HashMap::new(), 1.0);
        assert_eq!(out[0].last_seen, Some(t1));

        let rows = vec![row(Some("55"), "Severe", None)];
        let out = aggregate_costs(&rows, &HashMap::new(), &HashMap::new(), 1.0);
        assert_eq!(out[0].last_seen, None);
    }

    #[test]
    fn test_values_are_rounded() {
        let rows = vec![row(Some("55"), "Severe", None)];
        let out = aggregate_costs(&rows, &map(&[("55", 7.0)]), &map(&[("Severe", 3.333)]), 1.1);

        assert_eq!(out[0].delay_min_per_bus, 3.33);
        assert_eq!(out[0].headway_min, 7.0);
        // 3.333 * 60 / 7 * 1.1 = 31.4254...
        assert_eq!(out[0].cost_per_hour_gbp, 31.43);
    }

    #[test]
    fn test_cost_per_hour_guards_headway() {
        assert_eq!(disruption_cost_per_hour(10.0, 4.0, 2.0), 300.0);
        assert_eq!(disruption_cost_per_hour(8.0, -1.0, 1.0), 60.0);
        assert_eq!(disruption_cost_per_hour(8.0, f64::NAN, 1.0), 60.0);
    }
}
