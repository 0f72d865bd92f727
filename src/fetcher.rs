use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::source::{ListingSource, RawAmount, RawListing};
use crate::types::{Listing, Money, Query, ShippingOption};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchStats {
    pub api_total: usize,
    pub missing_price: usize,
    pub missing_shipping: usize,
    pub missing_end_time: usize,
    /// Records whose id repeated an earlier record in the same batch.
    pub duplicates: usize,
}

/// Search the listing source and map every record into a `Listing`.
/// One network call; errors from the source are surfaced untouched, no retry.
pub async fn fetch_listings(
    source: &dyn ListingSource,
    query: &Query,
) -> Result<(Vec<Listing>, FetchStats)> {
    info!(
        keyword = %query.keyword,
        buying_option = %query.buying_option,
        "Searching listing source"
    );
    let raw = source.search(query).await?;

    let mut stats = FetchStats { api_total: raw.len(), ..Default::default() };
    let mut seen = HashSet::new();
    let mut listings = Vec::with_capacity(raw.len());

    for (idx, record) in raw.iter().enumerate() {
        let listing = listing_from_raw(record, &format!("row-{idx}"), &mut stats);
        if !seen.insert(listing.id.clone()) {
            stats.duplicates += 1;
            debug!(listing_id = %listing.id, "Duplicate listing id in batch, keeping first");
            continue;
        }
        listings.push(listing);
    }

    if stats.duplicates > 0 {
        warn!("Listing source returned {} duplicate records", stats.duplicates);
    }
    Ok((listings, stats))
}

/// Fetch a single listing by id.
pub async fn fetch_listing(
    source: &dyn ListingSource,
    id: &str,
) -> Result<(Listing, FetchStats)> {
    info!(listing_id = %id, "Fetching single listing");
    let raw = source.get_by_id(id).await?;
    let mut stats = FetchStats { api_total: 1, ..Default::default() };
    let listing = listing_from_raw(&raw, id, &mut stats);
    Ok((listing, stats))
}

/// Map one raw record. Never fails: absent or unparseable amounts are zero,
/// an absent shipping list means free shipping, an absent end time stays unknown.
pub fn listing_from_raw(raw: &RawListing, fallback_id: &str, stats: &mut FetchStats) -> Listing {
    let price_field = raw.current_bid_price.as_ref().or(raw.price.as_ref());
    if price_field.and_then(|p| p.value.as_ref()).is_none() {
        stats.missing_price += 1;
    }

    let shipping_options = match &raw.shipping_options {
        Some(opts) => opts
            .iter()
            .map(|o| ShippingOption {
                shipping_cost: parse_amount(o.shipping_cost.as_ref()),
                import_charge: parse_amount(o.import_charge.as_ref()),
            })
            .collect(),
        None => {
            stats.missing_shipping += 1;
            Vec::new()
        }
    };

    let end_time = raw.item_end_date.as_deref().and_then(parse_end_time);
    if end_time.is_none() {
        stats.missing_end_time += 1;
    }

    Listing {
        id: raw
            .item_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| fallback_id.to_string()),
        title: raw.title.clone().unwrap_or_else(|| "Unknown".to_string()),
        current_price: parse_amount(price_field),
        shipping_options,
        end_time,
        detail_url: raw.item_web_url.clone().unwrap_or_default(),
    }
}

/// Amount value as money. Missing, malformed or negative values are zero.
pub fn parse_amount(amount: Option<&RawAmount>) -> Money {
    let parsed = match amount.and_then(|a| a.value.as_ref()) {
        Some(serde_json::Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        Some(serde_json::Value::Number(n)) => n.as_f64().and_then(Decimal::from_f64),
        _ => None,
    };
    parsed.filter(|d| !d.is_sign_negative()).unwrap_or(Decimal::ZERO)
}

/// Parse an RFC 3339 end timestamp such as `2025-06-01T18:30:00.000Z`.
pub fn parse_end_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Human-readable remaining time: `"2d 3h 15m left"`.
pub fn time_left(end_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(end) = end_time else {
        return "Time unknown".to_string();
    };
    let remaining = end - now;
    if remaining.num_seconds() <= 0 {
        return "Auction ended".to_string();
    }
    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;
    format!("{days}d {hours}h {minutes}m left")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::source::fakes::{amount, raw_listing, shipping, FakeListingSource};
    use crate::source::RawShippingOption;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn maps_records_and_computes_landed_cost() {
        let mut with_shipping = raw_listing("1", "Pikachu PSA 9", "10.00");
        with_shipping.current_bid_price = amount("12.50");
        with_shipping.shipping_options =
            Some(vec![shipping("5.00", "1.00"), shipping("4.25", "0")]);
        with_shipping.item_end_date = Some("2030-01-01T00:00:00.000Z".to_string());
        let source = FakeListingSource::new(vec![with_shipping, raw_listing("2", "Mew", "3")]);

        let (listings, stats) = fetch_listings(&source, &Query::keyword("pikachu")).await.unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].current_price, dec!(12.50));
        assert_eq!(listings[0].landed_cost(), dec!(16.75));
        assert!(listings[0].end_time.is_some());
        assert_eq!(listings[1].landed_cost(), listings[1].current_price);
        assert_eq!(stats.api_total, 2);
        assert_eq!(stats.missing_shipping, 1);
        assert_eq!(stats.missing_end_time, 1);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn missing_or_malformed_amounts_are_zero() {
        let mut stats = FetchStats::default();
        let mut raw = raw_listing("9", "Eevee", "not-a-number");
        raw.shipping_options = Some(vec![RawShippingOption::default()]);
        let listing = listing_from_raw(&raw, "row-0", &mut stats);
        assert_eq!(listing.current_price, Decimal::ZERO);
        assert_eq!(listing.landed_cost(), Decimal::ZERO);

        let bare = RawListing::default();
        let listing = listing_from_raw(&bare, "row-3", &mut stats);
        assert_eq!(listing.id, "row-3");
        assert_eq!(listing.title, "Unknown");
        assert_eq!(listing.current_price, Decimal::ZERO);
        assert_eq!(stats.missing_price, 1);
    }

    #[test]
    fn numeric_amounts_are_accepted() {
        let a = RawAmount { value: Some(serde_json::json!(7.5)), currency: None };
        assert_eq!(parse_amount(Some(&a)), dec!(7.5));
        let neg = RawAmount { value: Some(serde_json::json!("-2.00")), currency: None };
        assert_eq!(parse_amount(Some(&neg)), Decimal::ZERO);
    }

    #[tokio::test]
    async fn duplicate_ids_are_collapsed() {
        let source = FakeListingSource::new(vec![
            raw_listing("1", "A", "1"),
            raw_listing("1", "A again", "2"),
            raw_listing("2", "B", "3"),
        ]);
        let (listings, stats) = fetch_listings(&source, &Query::keyword("x")).await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].title, "A");
        assert_eq!(stats.duplicates, 1);
    }

    #[tokio::test]
    async fn source_errors_propagate_without_retry() {
        let source = FakeListingSource::failing(AppError::AuthExpired("401".to_string()));
        let err = fetch_listings(&source, &Query::keyword("x")).await.unwrap_err();
        assert!(matches!(err, AppError::AuthExpired(_)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn fetch_listing_by_id() {
        let source = FakeListingSource::new(vec![raw_listing("42", "Lugia", "99.99")]);
        let (listing, stats) = fetch_listing(&source, "42").await.unwrap();
        assert_eq!(listing.id, "42");
        assert_eq!(listing.current_price, dec!(99.99));
        assert_eq!(stats.api_total, 1);
        assert_eq!(stats.missing_shipping, 1);
        assert_eq!(stats.missing_end_time, 1);
        assert_eq!(stats.missing_price, 0);
        assert!(matches!(fetch_listing(&source, "7").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn oversized_amounts_do_not_abort_ingestion() {
        let huge = "50000000000000000000000000000";
        let mut raw = raw_listing("1", "Card", huge);
        raw.shipping_options = Some(vec![shipping(huge, "0")]);
        let source = FakeListingSource::new(vec![raw]);

        let (listings, _) = fetch_listings(&source, &Query::keyword("card")).await.unwrap();

        assert_eq!(listings[0].current_price, dec!(50000000000000000000000000000));
        assert_eq!(listings[0].landed_cost(), Decimal::MAX);
    }

    #[test]
    fn time_left_formats_remaining_time() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 3, 15, 45, 30).unwrap();
        assert_eq!(time_left(Some(end), now), "2d 3h 45m left");
        assert_eq!(time_left(Some(now), now), "Auction ended");
        assert_eq!(time_left(None, now), "Time unknown");
    }

    #[test]
    fn end_time_parses_fractional_utc() {
        let dt = parse_end_time("2025-06-01T18:30:00.000Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 6, 1, 18, 30, 0).unwrap());
        assert!(parse_end_time("tomorrow").is_none());
    }
}
