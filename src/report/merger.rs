use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::report::classifier::{classify, profit};
use crate::types::{AggregatedRow, Listing, ReferencePriceResult};

/// Join one listing with its resolution result. Pure; imposes no ordering.
pub fn merge(listing: &Listing, reference: &ReferencePriceResult) -> AggregatedRow {
    let profit = profit(reference.price, listing.landed_cost());
    AggregatedRow {
        listing: listing.clone(),
        reference: reference.clone(),
        profit,
        profit_sign: classify(profit),
    }
}

/// One row per listing, in ingestion order. A listing without a result
/// degrades to a `Failed` row rather than being dropped.
pub fn merge_all(
    listings: &[Listing],
    results: &HashMap<String, ReferencePriceResult>,
) -> Vec<AggregatedRow> {
    listings
        .iter()
        .map(|listing| match results.get(&listing.id) {
            Some(result) => merge(listing, result),
            None => merge(listing, &ReferencePriceResult::failed(&listing.id, None)),
        })
        .collect()
}

/// Caller-selected report ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankOrder {
    #[default]
    AsIngested,
    /// Soonest end time first; unknown end times last.
    EndingSoonest,
    /// Highest profit first; rows without profit last.
    ProfitDescending,
}

/// Stable sort, so ties keep ingestion order.
pub fn rank(rows: &mut [AggregatedRow], order: RankOrder) {
    match order {
        RankOrder::AsIngested => {}
        RankOrder::EndingSoonest => rows.sort_by(|a, b| {
            none_last(a.listing.end_time.as_ref(), b.listing.end_time.as_ref(), |x, y| x.cmp(y))
        }),
        RankOrder::ProfitDescending => rows.sort_by(|a, b| {
            none_last(a.profit.as_ref(), b.profit.as_ref(), |x, y| y.cmp(x))
        }),
    }
}

fn none_last<T>(a: Option<&T>, b: Option<&T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
