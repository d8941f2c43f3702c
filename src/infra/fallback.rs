use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::services::feed_api::TransitFeedApi;

/// A [`TransitFeedApi`] that asks `primary` first and, when it fails, logs a
/// warning and asks `secondary` instead.
pub struct WithFallback<P, S> {
    pub primary: P,
    pub secondary: S,
}

impl<P, S> WithFallback<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl<P: TransitFeedApi, S: TransitFeedApi> TransitFeedApi for WithFallback<P, S> {
    async fn bus_disruptions(&self) -> Result<Vec<Value>> {
        match self.primary.bus_disruptions().await {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(error = %e, "Using sample disruptions (offline mode)");
                self.secondary.bus_disruptions().await
            }
        }
    }

    async fn line_arrivals(&self, line_id: &str) -> Result<Vec<Value>> {
        match self.primary.line_arrivals(line_id).await {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(line_id, error = %e, "Using sample arrivals (offline mode)");
                self.secondary.line_arrivals(line_id).await
            }
        }
    }
}
