use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, StatusError, fetch_json};
use crate::services::feed_api::{TransitFeedApi, into_records};

pub const DEFAULT_BASE_URL: &str = "https://api.tfl.gov.uk";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const RETRIES: u32 = 2;
const BACKOFF_STEP: Duration = Duration::from_millis(800);

/// Client for the TfL unified API bus endpoints.
pub struct TflClient {
    base_url: String,
    http: Box<dyn HttpClient>,
    retries: u32,
    backoff_step: Duration,
}

impl TflClient {
    /// Builds a client against `base_url`, appending `app_key` to every request
    /// when one is given.
    pub fn new(base_url: impl Into<String>, app_key: Option<String>) -> Result<Self> {
        let basic = BasicClient::with_timeout(REQUEST_TIMEOUT)?;
        let http: Box<dyn HttpClient> = match app_key.filter(|k| !k.is_empty()) {
            Some(key) => Box::new(UrlParam::app_key(basic, key)),
            None => Box::new(basic),
        };

        Ok(Self::with_http_client(base_url, http))
    }

    /// Reads `TFL_BASE_URL` and `TFL_APP_KEY` from the environment.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("TFL_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, std::env::var("TFL_APP_KEY").ok())
    }

    pub fn with_http_client(base_url: impl Into<String>, http: Box<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            retries: RETRIES,
            backoff_step: BACKOFF_STEP,
        }
    }

    /// Overrides the retry policy: `retries` extra attempts, sleeping
    /// `backoff_step` times the attempt number after a transport error.
    /// A non-success status is retried without sleeping.
    pub fn with_retry_policy(mut self, retries: u32, backoff_step: Duration) -> Self {
        self.retries = retries;
        self.backoff_step = backoff_step;
        self
    }

    /// GETs `path` and returns its array body, retrying failed attempts.
    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    async fn get_records(&self, path: &str) -> Result<Vec<Value>> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = anyhow!("no attempt made");

        for attempt in 0..=self.retries {
            match fetch_json(self.http.as_ref(), &url).await {
                Ok(body) => match into_records(body) {
                    Ok(records) => {
                        debug!(attempt, records = records.len(), "TfL request succeeded");
                        return Ok(records);
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "Unexpected TfL response body");
                        last_err = e;
                    }
                },
                Err(e) if e.is::<StatusError>() => {
                    warn!(attempt, error = %e, "TfL request rejected");
                    last_err = e;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "TfL request failed");
                    last_err = e;
                    if attempt < self.retries {
                        tokio::time::sleep(self.backoff_step * (attempt + 1)).await;
                    }
                }
            }
        }

        Err(last_err.context(format!("GET {url} failed after {} attempts", self.retries + 1)))
    }
}

#[async_trait]
impl TransitFeedApi for TflClient {
    async fn bus_disruptions(&self) -> Result<Vec<Value>> {
        self.get_records("/Line/Mode/bus/Disruption").await
    }

    async fn line_arrivals(&self, line_id: &str) -> Result<Vec<Value>> {
        self.get_records(&format!("/Line/{line_id}/Arrivals")).await
    }
}
