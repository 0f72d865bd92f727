use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::EnrichConfig;
use crate::resolver::ReferenceResolver;
use crate::state::{Percentiles, ResolutionLatency, ResultStore};
use crate::types::{Listing, ReferencePriceResult, ResolutionStatus};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrichStats {
    pub found: usize,
    pub found_fallback: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Listings converted to `Failed` because the batch deadline elapsed
    /// (or their worker died) before they reached a terminal state.
    pub timed_out: usize,
    /// Time from dequeue to terminal result for listings a worker finished.
    pub latency: Percentiles,
}

#[derive(Debug, Clone)]
pub struct EnrichOutcome {
    /// Exactly one entry per distinct input listing id.
    pub results: HashMap<String, ReferencePriceResult>,
    pub stats: EnrichStats,
}

/// Runs the reference resolver over one ingestion batch on a fixed-size worker pool.
pub struct Enricher {
    resolver: Arc<ReferenceResolver>,
    cfg: EnrichConfig,
}

impl Enricher {
    pub fn new(resolver: Arc<ReferenceResolver>, cfg: EnrichConfig) -> Self {
        Self { resolver, cfg }
    }

    /// Resolve every listing and return once all have a terminal result or the
    /// deadline elapses. Never short-circuits on failures; listings still pending
    /// at the deadline are recorded as `Failed`.
    pub async fn enrich(&self, listings: &[Listing]) -> EnrichOutcome {
        let store = ResultStore::new();
        let latency = Arc::new(ResolutionLatency::new());

        if listings.is_empty() {
            return EnrichOutcome { results: HashMap::new(), stats: EnrichStats::default() };
        }

        // Queue is sized to the batch, so every send succeeds without waiting.
        let (tx, rx) = mpsc::channel::<Listing>(listings.len());
        for listing in listings {
            if let Err(e) = tx.try_send(listing.clone()) {
                error!("Enrichment queue rejected listing: {e}");
            }
        }
        drop(tx);

        let shared_rx = Arc::new(Mutex::new(rx));
        let workers = self.cfg.pool_size().min(listings.len());
        let started = Instant::now();
        info!(
            listings = listings.len(),
            workers,
            deadline = ?self.cfg.deadline,
            "Starting enrichment"
        );

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let rx = Arc::clone(&shared_rx);
            let resolver = Arc::clone(&self.resolver);
            let store = Arc::clone(&store);
            let latency = Arc::clone(&latency);
            set.spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(listing) = job else {
                        break;
                    };
                    let picked_up = Instant::now();
                    let result = resolver.resolve(&listing).await;
                    latency.record(picked_up.elapsed());
                    debug!(
                        worker,
                        listing_id = %listing.id,
                        status = %result.status,
                        "Listing resolved"
                    );
                    if !store.record(result) {
                        warn!(
                            listing_id = %listing.id,
                            "Duplicate listing id in batch, keeping first result"
                        );
                    }
                }
            });
        }

        let drain = async {
            while let Some(joined) = set.join_next().await {
                if let Err(e) = joined {
                    error!("Enrichment worker terminated abnormally: {e}");
                }
            }
        };
        match self.cfg.deadline {
            Some(deadline) => {
                if tokio::time::timeout(deadline, drain).await.is_err() {
                    warn!(
                        "Enrichment deadline of {:?} elapsed with {} of {} listings pending",
                        deadline,
                        listings.len().saturating_sub(store.len()),
                        listings.len()
                    );
                    set.shutdown().await;
                }
            }
            None => drain.await,
        }

        // Join barrier passed: no worker is running. Anything still missing failed.
        let timed_out = store.fail_pending(listings.iter().map(|l| l.id.as_str()));

        let counts = store.status_counts();
        let count = |s: ResolutionStatus| counts.get(&s).copied().unwrap_or(0);
        let stats = EnrichStats {
            found: count(ResolutionStatus::Found),
            found_fallback: count(ResolutionStatus::FoundFallback),
            not_found: count(ResolutionStatus::NotFound),
            failed: count(ResolutionStatus::Failed),
            timed_out,
            latency: latency.percentiles(),
        };

        info!(
            found = stats.found,
            found_fallback = stats.found_fallback,
            not_found = stats.not_found,
            failed = stats.failed,
            timed_out = stats.timed_out,
            resolved = latency.samples(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Enrichment complete | p50: {} | p95: {} | p99: {}",
            fmt_us(stats.latency.p50_us),
            fmt_us(stats.latency.p95_us),
            fmt_us(stats.latency.p99_us),
        );

        EnrichOutcome { results: store.snapshot(), stats }
    }
}

fn fmt_us(us: Option<u64>) -> String {
    match us {
        Some(v) => format!("{:.1}ms", v as f64 / 1000.0),
        None => "n/a".to_string(),
    }
}
