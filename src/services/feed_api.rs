//! Trait for the transit data source feeding the cost pipeline.

use anyhow::Result;
use serde_json::Value;

/// Abstraction over a provider of live disruption and arrival data
/// (e.g., the TfL unified API, or a directory of saved snapshots).
///
/// Records are returned raw; the analyzers read them leniently. An `Err`
/// means the source was unavailable, which callers treat as "no data".
#[async_trait::async_trait]
pub trait TransitFeedApi: Send + Sync {
    /// Returns the currently active bus disruptions.
    async fn bus_disruptions(&self) -> Result<Vec<Value>>;

    /// Returns the live arrival predictions for one line.
    async fn line_arrivals(&self, line_id: &str) -> Result<Vec<Value>>;
}

/// Unwraps a JSON array body; any other shape is an error.
pub fn into_records(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        other => Err(anyhow::anyhow!(
            "expected a JSON array, got {}",
            json_kind(&other)
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
