mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;

/// The server answered, but not with a success status.
#[derive(Debug)]
pub struct StatusError {
    pub url: String,
    pub status: StatusCode,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {} returned status {}", self.url, self.status)
    }
}

impl std::error::Error for StatusError {}

/// GETs `url` through `client` and decodes the body as JSON.
///
/// A non-success status is a [`StatusError`].
pub async fn fetch_json<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Value> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse()?,
    );

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(StatusError { url: url.to_string(), status }.into());
    }
    Ok(resp.json().await?)
}
