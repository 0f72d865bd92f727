use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{DiscoveredLink, ReferenceDiscovery};
use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::{AppError, Result};

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    error: Option<String>,
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    link: Option<String>,
}

/// Web-search discovery backed by a SerpAPI-compatible endpoint.
pub struct SerpDiscovery {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl SerpDiscovery {
    pub fn new(url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, url: url.to_string(), api_key: api_key.to_string() })
    }
}

#[async_trait]
impl ReferenceDiscovery for SerpDiscovery {
    async fn discover(&self, query_text: &str) -> Result<Vec<DiscoveredLink>> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[("engine", "google"), ("q", query_text), ("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("discovery: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("discovery: {e}")))?;
        if !status.is_success() {
            return Err(AppError::SourceUnavailable(format!("discovery: HTTP {status}")));
        }

        let links = parse_links(&body)?;
        debug!(query = %query_text, candidates = links.len(), "Discovery response");
        Ok(links)
    }
}

/// Candidate links in result order. A body carrying an `error` field is a failure,
/// not an empty result.
fn parse_links(body: &str) -> Result<Vec<DiscoveredLink>> {
    let resp: SearchResponse = serde_json::from_str(body)?;
    if let Some(err) = resp.error {
        return Err(AppError::SourceUnavailable(format!("discovery: {err}")));
    }
    Ok(resp
        .organic_results
        .into_iter()
        .filter_map(|r| r.link)
        .map(|link| DiscoveredLink { link })
        .collect())
}
