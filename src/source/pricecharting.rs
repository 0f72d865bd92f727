//! Price-guide page extractor.
//!
//! The guide renders one table row per grade: a `td` holding the grade name
//! followed by sibling cells, one of which holds the `$` price. Pages are plain
//! server-rendered HTML, so a static parse is enough.
//!
//! A graded lookup that misses is followed by an Ungraded lookup on the same
//! page, so fetched pages are kept in a small cache keyed by URL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::ReferenceExtractor;
use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::{AppError, Result};
use crate::types::ConditionLabel;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Grade rows the guide publishes.
const KNOWN_LABELS: &[&str] = &[
    "Ungraded",
    "PSA 10",
    "PSA 9.5",
    "PSA 9",
    "PSA 8",
    "PSA 7",
    "CGC 10",
    "CGC 9.5",
    "CGC 9",
    "CGC 8",
    "BGS 10",
    "BGS 9.5",
    "BGS 9",
    "BGS 8",
];

/// Pages held at once. Sized well above the worker pool so a page survives
/// until its listing's fallback lookup.
const PAGE_CACHE_CAPACITY: usize = 64;

/// URL → page body. Cleared wholesale when full.
struct PageCache {
    pages: DashMap<String, Arc<str>>,
    capacity: usize,
}

impl PageCache {
    fn new(capacity: usize) -> Self {
        Self { pages: DashMap::new(), capacity: capacity.max(1) }
    }

    fn get(&self, url: &str) -> Option<Arc<str>> {
        self.pages.get(url).map(|page| Arc::clone(page.value()))
    }

    fn insert(&self, url: &str, html: String) -> Arc<str> {
        if self.pages.len() >= self.capacity && !self.pages.contains_key(url) {
            self.pages.clear();
        }
        let html: Arc<str> = html.into();
        self.pages.insert(url.to_string(), Arc::clone(&html));
        html
    }

    fn len(&self) -> usize {
        self.pages.len()
    }
}

pub struct PriceChartingExtractor {
    client: reqwest::Client,
    pages: PageCache,
}

impl PriceChartingExtractor {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client, pages: PageCache::new(PAGE_CACHE_CAPACITY) })
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("price guide {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::SourceUnavailable(format!("price guide {url}: HTTP {status}")));
        }
        resp.text()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("price guide {url}: {e}")))
    }
}

#[async_trait]
impl ReferenceExtractor for PriceChartingExtractor {
    async fn extract_price(&self, page: &str, label: &ConditionLabel) -> Result<Option<String>> {
        let Some(row_label) = normalize_label(label) else {
            debug!(label = %label, "Label has no row in the price guide");
            return Ok(None);
        };
        let cached = self.pages.get(page);
        let html = match cached {
            Some(html) => html,
            None => {
                let html = self.pages.insert(page, self.fetch_html(page).await?);
                debug!(page, cached_pages = self.pages.len(), "Fetched price-guide page");
                html
            }
        };
        Ok(extract_price_from_html(&html, row_label))
    }
}

/// The guide's spelling of `label`, or `None` if the guide has no such row.
/// A miss here leaves the caller's Ungraded fallback to supply the price.
pub fn normalize_label(label: &ConditionLabel) -> Option<&'static str> {
    KNOWN_LABELS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(label.as_str().trim()))
}

/// Text of the first `$` cell following the `td` whose text is exactly `row_label`.
pub fn extract_price_from_html(html: &str, row_label: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let td = Selector::parse("td").ok()?;

    document
        .select(&td)
        .filter(|cell| cell_text(cell) == row_label)
        .find_map(|cell| {
            cell.next_siblings()
                .filter_map(ElementRef::wrap)
                .filter(|sib| sib.value().name() == "td")
                .map(|sib| cell_text(&sib))
                .find(|text| text.contains('$'))
        })
}

/// Element text with whitespace runs collapsed.
fn cell_text(el: &ElementRef) -> String {
    el.text().flat_map(|t| t.split_whitespace()).collect::<Vec<_>>().join(" ")
}
