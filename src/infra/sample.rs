use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::services::feed_api::{TransitFeedApi, into_records};

pub const DISRUPTIONS_FILE: &str = "sample_disruptions.json";

/// File name used for a line's saved arrivals.
pub fn arrivals_file_name(line_id: &str) -> String {
    format!("sample_arrivals_line{line_id}.json")
}

/// Serves disruption and arrival snapshots from JSON files in a directory.
///
/// A line without a saved arrivals file has no data (empty, not an error).
/// A missing disruptions file is an error.
pub struct SampleDirectory {
    dir: PathBuf,
}

impl SampleDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_records(path: &Path) -> Result<Vec<Value>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let body: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        into_records(body).with_context(|| format!("Unexpected content in {}", path.display()))
    }
}

#[async_trait]
impl TransitFeedApi for SampleDirectory {
    async fn bus_disruptions(&self) -> Result<Vec<Value>> {
        Self::read_records(&self.dir.join(DISRUPTIONS_FILE))
    }

    async fn line_arrivals(&self, line_id: &str) -> Result<Vec<Value>> {
        let path = self.dir.join(arrivals_file_name(line_id));
        if !path.exists() {
            return Ok(Vec::new());
        }
        Self::read_records(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn sample_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_reads_saved_snapshots() {
        let dir = sample_dir("bus_disruption_cost_sample_read");
        fs::write(dir.join(DISRUPTIONS_FILE), r#"[{"severity": "Severe"}]"#).unwrap();
        fs::write(dir.join(arrivals_file_name("55")), r#"[{"naptanId": "A"}, {"naptanId": "B"}]"#)
            .unwrap();

        let source = SampleDirectory::new(&dir);

        assert_eq!(source.bus_disruptions().await.unwrap().len(), 1);
        assert_eq!(source.line_arrivals("55").await.unwrap().len(), 2);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_missing_arrivals_is_empty_but_missing_disruptions_errors() {
        let dir = sample_dir("bus_disruption_cost_sample_missing");
        let source = SampleDirectory::new(&dir);

        assert!(source.line_arrivals("999").await.unwrap().is_empty());
        assert!(source.bus_disruptions().await.is_err());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = sample_dir("bus_disruption_cost_sample_malformed");
        fs::write(dir.join(DISRUPTIONS_FILE), "{not json").unwrap();

        assert!(SampleDirectory::new(&dir).bus_disruptions().await.is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
