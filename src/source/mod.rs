//! Capability interfaces for the external collaborators: the listing source,
//! the reference-page discovery service and the reference-price extractor.
//! The pipeline only sees these traits; concrete HTTP adapters live alongside.

pub mod ebay;
pub mod pricecharting;
pub mod serp;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::types::{ConditionLabel, Query};

pub use ebay::EbayBrowseClient;
pub use pricecharting::PriceChartingExtractor;
pub use serp::SerpDiscovery;

// ---------------------------------------------------------------------------
// Raw listing schema
// ---------------------------------------------------------------------------

/// A listing record as returned by the listing source. Every field is
/// optional; the ingestor decides what absence means.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    pub item_id: Option<String>,
    pub title: Option<String>,
    pub price: Option<RawAmount>,
    pub current_bid_price: Option<RawAmount>,
    pub shipping_options: Option<Vec<RawShippingOption>>,
    pub item_end_date: Option<String>,
    pub item_web_url: Option<String>,
}

/// `{ "value": "12.34", "currency": "USD" }`. The value may arrive as a string or a number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAmount {
    pub value: Option<serde_json::Value>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawShippingOption {
    pub shipping_cost: Option<RawAmount>,
    pub import_charge: Option<RawAmount>,
}

/// One candidate reference page returned by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscoveredLink {
    pub link: String,
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Listing data source. Implementations distinguish `AuthExpired`,
/// `SourceUnavailable` and `NotFound` and never retry internally.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn search(&self, query: &Query) -> Result<Vec<RawListing>>;

    async fn get_by_id(&self, id: &str) -> Result<RawListing>;
}

#[async_trait]
pub trait ReferenceDiscovery: Send + Sync {
    /// Zero or more candidate links for a free-text query, best first.
    async fn discover(&self, query_text: &str) -> Result<Vec<DiscoveredLink>>;
}

#[async_trait]
pub trait ReferenceExtractor: Send + Sync {
    /// Raw textual price for `label` on `page`, or `None` if the page has none.
    async fn extract_price(&self, page: &str, label: &ConditionLabel) -> Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// In-memory capabilities for tests
// ---------------------------------------------------------------------------
