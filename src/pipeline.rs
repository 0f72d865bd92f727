//! Stateless request/response driver: raw input in, ordered report out.
//!
//! Normalization and ingestion run on the caller's task; enrichment is the
//! only parallel stage. The report is assembled after the enrichment join
//! barrier, so rows never observe a partially populated result set.

use std::sync::Arc;

use tracing::{info, warn};

use crate::enricher::{EnrichStats, Enricher};
use crate::error::{AppError, Result};
use crate::fetcher::{fetch_listing, fetch_listings, FetchStats};
use crate::query::{normalize, NormalizedInput};
use crate::report::{merge_all, rank, RankOrder};
use crate::source::ListingSource;
use crate::types::{AggregatedRow, BuyingOption, Listing};

/// Per-request options chosen by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub order: RankOrder,
    /// Replaces the buying option of plain keyword input. Search links keep their own.
    pub buying_option: Option<BuyingOption>,
    /// Keeps only the first `n` ingested listings before enrichment.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub rows: Vec<AggregatedRow>,
    pub fetch_stats: FetchStats,
    pub enrich_stats: EnrichStats,
}

pub struct Pipeline {
    source: Arc<dyn ListingSource>,
    enricher: Enricher,
}

impl Pipeline {
    pub fn new(source: Arc<dyn ListingSource>, enricher: Enricher) -> Self {
        Self { source, enricher }
    }

    /// Run one request end to end. Invalid input is rejected before any
    /// network call; listing-source failures are returned as-is. Once listings
    /// are ingested a report is always produced, whatever enrichment yields.
    pub async fn run(&self, raw_input: &str, opts: RunOptions) -> Result<Report> {
        let (listings, fetch_stats) = match normalize(raw_input) {
            NormalizedInput::Invalid(reason) => {
                warn!("Rejected input {raw_input:?}: {reason}");
                return Err(AppError::Invalid(reason));
            }
            NormalizedInput::ListingId(id) => {
                let (listing, stats) = fetch_listing(self.source.as_ref(), &id).await?;
                (vec![listing], stats)
            }
            NormalizedInput::SearchLink(query) => {
                fetch_listings(self.source.as_ref(), &query).await?
            }
            NormalizedInput::Keyword(mut query) => {
                if let Some(option) = opts.buying_option {
                    query.buying_option = option;
                }
                fetch_listings(self.source.as_ref(), &query).await?
            }
        };

        let listings = apply_limit(listings, opts.limit);
        Ok(self.report(listings, fetch_stats, opts.order).await)
    }

    async fn report(
        &self,
        listings: Vec<Listing>,
        fetch_stats: FetchStats,
        order: RankOrder,
    ) -> Report {
        info!(
            listings = listings.len(),
            missing_shipping = fetch_stats.missing_shipping,
            missing_end_time = fetch_stats.missing_end_time,
            "Ingestion complete"
        );

        let outcome = self.enricher.enrich(&listings).await;
        let mut rows = merge_all(&listings, &outcome.results);
        rank(&mut rows, order);

        Report { rows, fetch_stats, enrich_stats: outcome.stats }
    }
}

fn apply_limit(mut listings: Vec<Listing>, limit: Option<usize>) -> Vec<Listing> {
    if let Some(n) = limit {
        listings.truncate(n);
    }
    listings
}
