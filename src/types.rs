use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency amount in dollars.
pub type Money = Decimal;

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub keyword: String,
    pub buying_option: BuyingOption,
    pub category_id: Option<String>,
    pub sort_key: Option<SortKey>,
}

impl Query {
    /// Keyword-only query restricted to auctions.
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            buying_option: BuyingOption::Auction,
            category_id: None,
            sort_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuyingOption {
    Auction,
    FixedPrice,
    Any,
}

impl BuyingOption {
    /// Listing-source filter expression, if this option restricts results.
    pub fn filter(&self) -> Option<&'static str> {
        match self {
            BuyingOption::Auction => Some("buyingOptions:{AUCTION}"),
            BuyingOption::FixedPrice => Some("buyingOptions:{FIXED_PRICE}"),
            BuyingOption::Any => None,
        }
    }
}

impl std::fmt::Display for BuyingOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BuyingOption::Auction => "AUCTION",
            BuyingOption::FixedPrice => "FIXED_PRICE",
            BuyingOption::Any => "ANY",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    EndingSoonest,
    PricePlusShippingLowest,
    PricePlusShippingHighest,
    NewlyListed,
}

impl SortKey {
    /// Maps a search-link `_sop` code. Codes outside the table yield `None`.
    pub fn from_sort_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(SortKey::EndingSoonest),
            "10" => Some(SortKey::PricePlusShippingLowest),
            "15" => Some(SortKey::PricePlusShippingHighest),
            "12" => Some(SortKey::NewlyListed),
            _ => None,
        }
    }

    pub fn as_api_str(&self) -> &'static str {
        match self {
            SortKey::EndingSoonest => "endingSoonest",
            SortKey::PricePlusShippingLowest => "pricePlusShippingLowest",
            SortKey::PricePlusShippingHighest => "pricePlusShippingHighest",
            SortKey::NewlyListed => "newlyListed",
        }
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingOption {
    pub shipping_cost: Money,
    pub import_charge: Money,
}

impl ShippingOption {
    /// Saturates at `Decimal::MAX` instead of overflowing on absurd upstream amounts.
    pub fn total(&self) -> Money {
        saturating_add(self.shipping_cost, self.import_charge)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub current_price: Money,
    pub shipping_options: Vec<ShippingOption>,
    pub end_time: Option<DateTime<Utc>>,
    pub detail_url: String,
}

impl Listing {
    /// Cheapest shipping + import total; zero when no options are listed.
    pub fn cheapest_shipping(&self) -> Money {
        self.shipping_options
            .iter()
            .map(ShippingOption::total)
            .min()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn landed_cost(&self) -> Money {
        saturating_add(self.current_price, self.cheapest_shipping())
    }
}

fn saturating_add(a: Money, b: Money) -> Money {
    a.checked_add(b).unwrap_or(Decimal::MAX)
}

// ---------------------------------------------------------------------------
// Condition label
// ---------------------------------------------------------------------------

/// Normalized grade token such as "PSA 10" or "Ungraded".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionLabel(String);

impl ConditionLabel {
    pub const UNGRADED: &'static str = "Ungraded";

    pub fn ungraded() -> Self {
        Self(Self::UNGRADED.to_string())
    }

    pub fn graded(vendor: &str, grade: &str) -> Self {
        Self(format!("{} {}", vendor.to_uppercase(), grade))
    }

    pub fn is_ungraded(&self) -> bool {
        self.0 == Self::UNGRADED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConditionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Reference price resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Price found for the listing's own condition label.
    Found,
    /// Price found only under the "Ungraded" fallback label.
    FoundFallback,
    /// No reference page, or no price on the page. Not an error.
    NotFound,
    /// Transport error, per-call timeout or orchestration deadline.
    Failed,
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResolutionStatus::Found => "found",
            ResolutionStatus::FoundFallback => "found_fallback",
            ResolutionStatus::NotFound => "not_found",
            ResolutionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One per listing per enrichment run. `matched_label` may differ from the
/// label the listing asked for; check it before trusting `price` as grade-accurate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePriceResult {
    pub listing_id: String,
    pub price: Option<Money>,
    pub source_url: Option<String>,
    pub matched_label: Option<ConditionLabel>,
    pub status: ResolutionStatus,
}

impl ReferencePriceResult {
    pub fn found(listing_id: &str, price: Money, source_url: &str, label: ConditionLabel) -> Self {
        Self {
            listing_id: listing_id.to_string(),
            price: Some(price),
            source_url: Some(source_url.to_string()),
            matched_label: Some(label),
            status: ResolutionStatus::Found,
        }
    }

    pub fn found_fallback(listing_id: &str, price: Money, source_url: &str) -> Self {
        Self {
            status: ResolutionStatus::FoundFallback,
            ..Self::found(listing_id, price, source_url, ConditionLabel::ungraded())
        }
    }

    pub fn not_found(listing_id: &str, source_url: Option<&str>) -> Self {
        Self {
            listing_id: listing_id.to_string(),
            price: None,
            source_url: source_url.map(str::to_string),
            matched_label: None,
            status: ResolutionStatus::NotFound,
        }
    }

    pub fn failed(listing_id: &str, source_url: Option<&str>) -> Self {
        Self {
            status: ResolutionStatus::Failed,
            ..Self::not_found(listing_id, source_url)
        }
    }
}

// ---------------------------------------------------------------------------
// Report rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitSign {
    Positive,
    Negative,
    /// No reference price, or profit of exactly zero.
    Unknown,
}

impl std::fmt::Display for ProfitSign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProfitSign::Positive => "positive",
            ProfitSign::Negative => "negative",
            ProfitSign::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Derived per report; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRow {
    pub listing: Listing,
    pub reference: ReferencePriceResult,
    pub profit: Option<Money>,
    pub profit_sign: ProfitSign,
}
