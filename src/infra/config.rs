use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::analyzers::types::UNDEFINED_SEVERITY;

/// Cost-model assumptions and the default line watchlist.
///
/// Stored as a JSON object on disk; every section and field is optional:
/// ```json
/// {
///   "costs": { "cost_per_bus_minute_gbp": 1.5 },
///   "delays": { "severity_to_delay_minutes": { "Severe": 10, "Undefined": 5 } },
///   "headway": { "min_headway_minutes": 3, "max_headway_minutes": 20 },
///   "watchlist": { "default_lines": ["55", "25"] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub costs: CostsConfig,
    pub delays: DelaysConfig,
    pub headway: HeadwayConfig,
    pub watchlist: WatchlistConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostsConfig {
    pub cost_per_bus_minute_gbp: f64,
}

impl Default for CostsConfig {
    fn default() -> Self {
        Self { cost_per_bus_minute_gbp: 1.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelaysConfig {
    pub severity_to_delay_minutes: HashMap<String, f64>,
}

impl Default for DelaysConfig {
    fn default() -> Self {
        let severity_to_delay_minutes = [
            ("Minimal", 2.0),
            ("Minor", 3.0),
            ("Moderate", 6.0),
            ("Serious", 8.0),
            ("Severe", 10.0),
            (UNDEFINED_SEVERITY, 5.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self { severity_to_delay_minutes }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadwayConfig {
    pub min_headway_minutes: f64,
    pub max_headway_minutes: f64,
}

impl Default for HeadwayConfig {
    fn default() -> Self {
        Self {
            min_headway_minutes: 3.0,
            max_headway_minutes: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchlistConfig {
    pub default_lines: Vec<String>,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            default_lines: ["55", "25", "149", "29"].map(String::from).to_vec(),
        }
    }
}

impl AppConfig {
    /// Loads and validates the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `path` if given, else from `COST_CONFIG`, else the defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path.map(str::to_string).or_else(|| std::env::var("COST_CONFIG").ok()) {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let cost = self.costs.cost_per_bus_minute_gbp;
        if !(cost.is_finite() && cost > 0.0) {
            bail!("cost_per_bus_minute_gbp must be positive, got {cost}");
        }

        for (severity, delay) in &self.delays.severity_to_delay_minutes {
            if !(delay.is_finite() && *delay > 0.0) {
                bail!("delay for severity '{severity}' must be positive, got {delay}");
            }
        }

        let HeadwayConfig {
            min_headway_minutes: min,
            max_headway_minutes: max,
        } = self.headway;
        if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0) {
            bail!("headway bounds must be positive, got [{min}, {max}]");
        }
        if min >= max {
            bail!("min_headway_minutes ({min}) must be below max_headway_minutes ({max})");
        }

        Ok(())
    }

    /// Applies command-line overrides for the cost per minute and per-severity delays.
    pub fn with_overrides(mut self, cost_per_minute: Option<f64>, delays: &[(String, f64)]) -> Result<Self> {
        if let Some(cost) = cost_per_minute {
            self.costs.cost_per_bus_minute_gbp = cost;
        }
        for (severity, minutes) in delays {
            self.delays
                .severity_to_delay_minutes
                .insert(severity.clone(), *minutes);
        }
        self.validate()?;
        Ok(self)
    }
}

/// Parses a `SEVERITY=MINUTES` command-line pair.
pub fn parse_delay_override(s: &str) -> Result<(String, f64), String> {
    let (severity, minutes) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SEVERITY=MINUTES, got '{s}'"))?;
    let minutes = minutes
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid minutes in '{s}': {e}"))?;
    Ok((severity.trim().to_string(), minutes))
}
