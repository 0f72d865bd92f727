use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::{ListingSource, RawListing};
use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::{AppError, Result};
use crate::types::Query;

/// Search response envelope. `itemSummaries` is omitted entirely when nothing matches.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    item_summaries: Vec<RawListing>,
    total: Option<u64>,
}

/// Which call a response belongs to. Only a missing item is `NotFound`; a 404
/// from the search endpoint means the endpoint itself is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Search,
    Item,
}

/// Browse-API listing source authenticated with a bearer token.
pub struct EbayBrowseClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    limit: usize,
}

impl EbayBrowseClient {
    pub fn new(base_url: &str, token: &str, limit: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            limit,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        params: &[(&str, String)],
        endpoint: Endpoint,
        what: &str,
    ) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("{what}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status, endpoint, what));
        }
        resp.json::<T>()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("{what}: malformed body: {e}")))
    }
}

#[async_trait]
impl ListingSource for EbayBrowseClient {
    async fn search(&self, query: &Query) -> Result<Vec<RawListing>> {
        let url = format!("{}/item_summary/search", self.base_url);
        let params = search_params(query, self.limit);
        let resp: SearchResponse =
            self.get_json(&url, &params, Endpoint::Search, "listing search").await?;
        debug!(
            returned = resp.item_summaries.len(),
            total = resp.total.unwrap_or_default(),
            "Listing search response"
        );
        Ok(resp.item_summaries)
    }

    async fn get_by_id(&self, id: &str) -> Result<RawListing> {
        let url = format!("{}/item/{}", self.base_url, id);
        self.get_json(&url, &[], Endpoint::Item, &format!("listing {id}")).await
    }
}

/// Query-string parameters for one search call.
fn search_params(query: &Query, limit: usize) -> Vec<(&'static str, String)> {
    let mut params = vec![("q", query.keyword.clone()), ("limit", limit.to_string())];
    if let Some(filter) = query.buying_option.filter() {
        params.push(("filter", filter.to_string()));
    }
    if let Some(sort) = query.sort_key {
        params.push(("sort", sort.as_api_str().to_string()));
    }
    if let Some(category) = &query.category_id {
        params.push(("category_ids", category.clone()));
    }
    params
}

fn status_error(status: StatusCode, endpoint: Endpoint, what: &str) -> AppError {
    match (status, endpoint) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            AppError::AuthExpired(format!("{what}: HTTP {status}"))
        }
        (StatusCode::NOT_FOUND, Endpoint::Item) => AppError::NotFound(what.to_string()),
        _ => AppError::SourceUnavailable(format!("{what}: HTTP {status}")),
    }
}
