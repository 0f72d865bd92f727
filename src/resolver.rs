//! Two-stage reference price lookup for one listing.
//!
//! ```text
//! Start -> PageLookup -+-> PageMiss -------------------------> NotFound
//!                      +-> PageFound -> PriceLookup(label) -+-> Found
//!                                                           +-> PriceMiss -> Fallback
//!
//! Fallback = PriceLookup(Ungraded) -+-> FoundFallback
//!                                   +-> NotFound
//! ```
//!
//! The fallback is skipped when the listing's own label is already "Ungraded".
//! Transport errors and per-call timeouts at any stage end in `Failed`; nothing
//! propagates out of `resolve`.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{EnrichConfig, REFERENCE_DOMAIN_HINT, REFERENCE_PATH_PATTERN};
use crate::error::AppError;
use crate::grading::condition_label;
use crate::source::{ReferenceDiscovery, ReferenceExtractor};
use crate::types::{ConditionLabel, Listing, Money, ReferencePriceResult};

lazy_static! {
    // Optional "$", comma-grouped thousands or a plain digit run, optional fraction.
    static ref PRICE_REGEX: Regex =
        Regex::new(r"^\$?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?$").unwrap();
}

/// Strictly parse a textual reference price. Anything that is not a plain
/// currency number is a miss, never zero.
pub fn parse_reference_price(text: &str) -> Option<Money> {
    let text = text.trim();
    if !PRICE_REGEX.is_match(text) {
        return None;
    }
    let digits: String = text.chars().filter(|c| *c != '$' && *c != ',').collect();
    Decimal::from_str(&digits).ok()
}

#[derive(Debug, Error)]
enum StageError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Source(#[from] AppError),
}

pub struct ReferenceResolver {
    discovery: Arc<dyn ReferenceDiscovery>,
    extractor: Arc<dyn ReferenceExtractor>,
    domain_hint: String,
    path_pattern: String,
    discovery_timeout: Duration,
    extraction_timeout: Duration,
}

impl ReferenceResolver {
    pub fn new(
        discovery: Arc<dyn ReferenceDiscovery>,
        extractor: Arc<dyn ReferenceExtractor>,
        enrich: &EnrichConfig,
    ) -> Self {
        Self {
            discovery,
            extractor,
            domain_hint: REFERENCE_DOMAIN_HINT.to_string(),
            path_pattern: REFERENCE_PATH_PATTERN.to_string(),
            discovery_timeout: enrich.discovery_timeout,
            extraction_timeout: enrich.extraction_timeout,
        }
    }

    /// Override the discovery query suffix and the accepted link pattern.
    pub fn with_reference_domain(mut self, domain_hint: &str, path_pattern: &str) -> Self {
        self.domain_hint = domain_hint.to_string();
        self.path_pattern = path_pattern.to_string();
        self
    }

    pub async fn resolve(&self, listing: &Listing) -> ReferencePriceResult {
        let id = listing.id.as_str();
        let label = condition_label(&listing.title);

        let page = match self.lookup_page(&listing.title).await {
            Ok(Some(page)) => page,
            Ok(None) => {
                debug!(listing_id = %id, "No reference page matched");
                return ReferencePriceResult::not_found(id, None);
            }
            Err(e) => {
                warn!(listing_id = %id, "Reference page lookup failed: {e}");
                return ReferencePriceResult::failed(id, None);
            }
        };

        match self.lookup_price(&page, &label).await {
            Ok(Some(price)) => return ReferencePriceResult::found(id, price, &page, label),
            Ok(None) => debug!(listing_id = %id, label = %label, "Price miss for requested label"),
            Err(e) => {
                warn!(listing_id = %id, label = %label, "Reference price lookup failed: {e}");
                return ReferencePriceResult::failed(id, Some(&page));
            }
        }

        if label.is_ungraded() {
            return ReferencePriceResult::not_found(id, Some(&page));
        }

        match self.lookup_price(&page, &ConditionLabel::ungraded()).await {
            Ok(Some(price)) => {
                debug!(listing_id = %id, requested = %label, "Using Ungraded fallback price");
                ReferencePriceResult::found_fallback(id, price, &page)
            }
            Ok(None) => ReferencePriceResult::not_found(id, Some(&page)),
            Err(e) => {
                warn!(listing_id = %id, "Fallback price lookup failed: {e}");
                ReferencePriceResult::failed(id, Some(&page))
            }
        }
    }

    /// First discovered link matching the reference path pattern.
    async fn lookup_page(&self, title: &str) -> Result<Option<String>, StageError> {
        let query_text = format!("{} {}", title.trim(), self.domain_hint);
        let discover = self.discovery.discover(&query_text);
        let links = tokio::time::timeout(self.discovery_timeout, discover)
            .await
            .map_err(|_| StageError::Timeout(self.discovery_timeout))??;

        Ok(links
            .into_iter()
            .map(|l| l.link)
            .find(|link| link.contains(self.path_pattern.as_str())))
    }

    async fn lookup_price(
        &self,
        page: &str,
        label: &ConditionLabel,
    ) -> Result<Option<Money>, StageError> {
        let text = tokio::time::timeout(
            self.extraction_timeout,
            self.extractor.extract_price(page, label),
        )
        .await
        .map_err(|_| StageError::Timeout(self.extraction_timeout))??;

        Ok(text.as_deref().and_then(|t| {
            let parsed = parse_reference_price(t);
            if parsed.is_none() {
                debug!(page = %page, raw = %t, "Discarding non-numeric reference price");
            }
            parsed
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fakes::{FakeDiscovery, FakeExtractor, Scripted};
    use crate::types::ResolutionStatus;
    use rust_decimal_macros::dec;

    const PAGE: &str = "https://www.pricecharting.com/game/pokemon-base-set/charizard-4";

    fn listing(title: &str) -> Listing {
        Listing {
            id: "L1".to_string(),
            title: title.to_string(),
            current_price: dec!(10),
            shipping_options: vec![],
            end_time: None,
            detail_url: String::new(),
        }
    }

    fn resolver(discovery: FakeDiscovery, extractor: Arc<FakeExtractor>) -> ReferenceResolver {
        let cfg = EnrichConfig {
            discovery_timeout: Duration::from_millis(200),
            extraction_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        ReferenceResolver::new(Arc::new(discovery), extractor, &cfg)
    }

    #[test]
    fn strict_price_pattern() {
        assert_eq!(parse_reference_price("$12.99"), Some(dec!(12.99)));
        assert_eq!(parse_reference_price("1,234.50"), Some(dec!(1234.50)));
        assert_eq!(parse_reference_price(" $1,000 "), Some(dec!(1000)));
        assert_eq!(parse_reference_price("1234.5"), Some(dec!(1234.5)));
        assert_eq!(parse_reference_price("Ask"), None);
        assert_eq!(parse_reference_price("$N/A"), None);
        assert_eq!(parse_reference_price(""), None);
        assert_eq!(parse_reference_price("$"), None);
        assert_eq!(parse_reference_price("12,34.00"), None);
        assert_eq!(parse_reference_price("$12.99 - $15.00"), None);
    }

    #[tokio::test]
    async fn found_for_requested_label() {
        let discovery = FakeDiscovery::default().with(
            "Charizard PSA 9",
            Scripted::Value(vec!["https://example.com/other", PAGE]),
        );
        let extractor = Arc::new(FakeExtractor::default().with(
            PAGE,
            "PSA 9",
            Scripted::Value(Some("$1,250.00")),
        ));

        let r = resolver(discovery, extractor.clone()).resolve(&listing("Charizard PSA 9")).await;

        assert_eq!(r.status, ResolutionStatus::Found);
        assert_eq!(r.price, Some(dec!(1250.00)));
        assert_eq!(r.source_url.as_deref(), Some(PAGE));
        assert_eq!(r.matched_label.as_ref().map(|l| l.as_str()), Some("PSA 9"));
        assert_eq!(extractor.requested().len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_ungraded_on_miss() {
        let discovery = FakeDiscovery::default().with("Charizard", Scripted::Value(vec![PAGE]));
        let extractor = Arc::new(
            FakeExtractor::default()
                .with(PAGE, "PSA 9", Scripted::Value(Some("N/A")))
                .with(PAGE, "Ungraded", Scripted::Value(Some("$300.00"))),
        );

        let r = resolver(discovery, extractor.clone()).resolve(&listing("Charizard PSA 9")).await;

        assert_eq!(r.status, ResolutionStatus::FoundFallback);
        assert_eq!(r.price, Some(dec!(300.00)));
        assert_eq!(r.matched_label, Some(ConditionLabel::ungraded()));
        assert_eq!(extractor.requested().len(), 2);
    }

    #[tokio::test]
    async fn ungraded_miss_skips_fallback() {
        let discovery = FakeDiscovery::default().with("Charizard", Scripted::Value(vec![PAGE]));
        let extractor = Arc::new(FakeExtractor::default());

        let r = resolver(discovery, extractor.clone()).resolve(&listing("Charizard raw")).await;

        assert_eq!(r.status, ResolutionStatus::NotFound);
        assert_eq!(r.price, None);
        assert_eq!(r.source_url.as_deref(), Some(PAGE));
        assert_eq!(extractor.requested(), vec![(PAGE.to_string(), "Ungraded".to_string())]);
    }

    #[tokio::test]
    async fn fallback_miss_is_not_found() {
        let discovery = FakeDiscovery::default().with("Charizard", Scripted::Value(vec![PAGE]));
        let extractor = Arc::new(FakeExtractor::default());

        let r = resolver(discovery, extractor.clone()).resolve(&listing("Charizard CGC 9.5")).await;

        assert_eq!(r.status, ResolutionStatus::NotFound);
        assert_eq!(r.matched_label, None);
        assert_eq!(extractor.requested().len(), 2);
    }

    #[tokio::test]
    async fn no_matching_link_is_page_miss() {
        let discovery = FakeDiscovery::default()
            .with("Charizard", Scripted::Value(vec!["https://www.tcgplayer.com/product/1"]));
        let extractor = Arc::new(FakeExtractor::default());

        let r = resolver(discovery, extractor.clone()).resolve(&listing("Charizard PSA 10")).await;

        assert_eq!(r.status, ResolutionStatus::NotFound);
        assert_eq!(r.source_url, None);
        assert!(extractor.requested().is_empty());
    }

    #[tokio::test]
    async fn discovery_error_is_failed() {
        let discovery = FakeDiscovery::default().with("Charizard", Scripted::Fail);
        let r = resolver(discovery, Arc::new(FakeExtractor::default()))
            .resolve(&listing("Charizard PSA 10"))
            .await;
        assert_eq!(r.status, ResolutionStatus::Failed);
    }

    #[tokio::test]
    async fn extraction_timeout_is_failed() {
        let discovery = FakeDiscovery::default().with("Charizard", Scripted::Value(vec![PAGE]));
        let extractor = Arc::new(FakeExtractor::default().with(PAGE, "PSA 10", Scripted::Hang));

        let r = resolver(discovery, extractor).resolve(&listing("Charizard PSA 10")).await;

        assert_eq!(r.status, ResolutionStatus::Failed);
        assert_eq!(r.source_url.as_deref(), Some(PAGE));
        assert_eq!(r.price, None);
    }

    #[tokio::test]
    async fn discovery_query_carries_domain_hint() {
        let discovery = FakeDiscovery::default()
            .with("Charizard PSA 10 pricecharting.com pokemon", Scripted::Value(vec![PAGE]));
        let extractor =
            Arc::new(FakeExtractor::default().with(PAGE, "PSA 10", Scripted::Value(Some("$5"))));

        let r = resolver(discovery, extractor).resolve(&listing("Charizard PSA 10")).await;

        assert_eq!(r.status, ResolutionStatus::Found);
        assert_eq!(r.price, Some(dec!(5)));
    }
}
