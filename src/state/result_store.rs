use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::types::{ReferencePriceResult, ResolutionStatus};

// ---------------------------------------------------------------------------
// ResultStore
// ---------------------------------------------------------------------------

/// listing_id → resolution result for one enrichment run.
///
/// Each key is written at most once. Workers own disjoint keys, so the only
/// contention is the shard lock taken by `DashMap` on insert.
#[derive(Default)]
pub struct ResultStore {
    results: DashMap<String, ReferencePriceResult>,
}

impl ResultStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a terminal result. Returns false (and keeps the first value)
    /// if the listing already has one.
    pub fn record(&self, result: ReferencePriceResult) -> bool {
        match self.results.entry(result.listing_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(result);
                true
            }
        }
    }

    pub fn get(&self, listing_id: &str) -> Option<ReferencePriceResult> {
        self.results.get(listing_id).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Mark every listing in `ids` that has no result yet as `Failed`.
    /// Returns how many were filled in.
    pub fn fail_pending<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        ids.into_iter()
            .filter(|id| self.record(ReferencePriceResult::failed(id, None)))
            .count()
    }

    /// Count of results per status.
    pub fn status_counts(&self) -> HashMap<ResolutionStatus, usize> {
        let mut counts = HashMap::new();
        for entry in self.results.iter() {
            *counts.entry(entry.value().status).or_insert(0) += 1;
        }
        counts
    }

    /// Copy out the finished mapping. Call only after the join barrier.
    pub fn snapshot(&self) -> HashMap<String, ReferencePriceResult> {
        self.results
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
