use std::time::Duration;

use crate::error::{AppError, Result};

pub const EBAY_API_URL: &str = "https://api.ebay.com/buy/browse/v1";
pub const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// Appended to every listing title when asking the discovery capability for a page.
pub const REFERENCE_DOMAIN_HINT: &str = "pricecharting.com pokemon";

/// A discovered link is accepted only if it contains this substring.
pub const REFERENCE_PATH_PATTERN: &str = "pricecharting.com/game/pokemon";

/// Max listings requested per search call.
pub const SEARCH_LIMIT: usize = 20;

/// Default enrichment worker pool size. Kept small to respect third-party rate limits.
pub const ENRICH_WORKERS: usize = 3;

/// Upper bound on the worker pool, regardless of ENRICH_WORKERS.
pub const MAX_ENRICH_WORKERS: usize = 16;

/// Per-call bound on the page discovery stage (seconds).
pub const DISCOVERY_TIMEOUT_SECS: u64 = 15;

/// Per-call bound on each price extraction call (seconds).
pub const EXTRACTION_TIMEOUT_SECS: u64 = 20;

/// Overall bound on one enrichment batch (seconds).
pub const ENRICH_DEADLINE_SECS: u64 = 120;

/// HTTP client timeout for the listing source (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub ebay_api_url: String,
    /// Bearer credential for the listing source (EBAY_OAUTH_TOKEN). Supplied out of band.
    pub ebay_token: Option<String>,
    pub search_limit: usize,
    pub serpapi_url: String,
    pub serpapi_key: Option<String>,
    pub reference_domain_hint: String,
    pub reference_path_pattern: String,
    pub enrich: EnrichConfig,
}

/// Tunables for the enrichment stage.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub workers: usize,
    pub discovery_timeout: Duration,
    pub extraction_timeout: Duration,
    /// `None` waits for every listing to reach a terminal state.
    pub deadline: Option<Duration>,
}

impl EnrichConfig {
    /// Worker count clamped to `1..=MAX_ENRICH_WORKERS`.
    pub fn pool_size(&self) -> usize {
        self.workers.clamp(1, MAX_ENRICH_WORKERS)
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            workers: ENRICH_WORKERS,
            discovery_timeout: Duration::from_secs(DISCOVERY_TIMEOUT_SECS),
            extraction_timeout: Duration::from_secs(EXTRACTION_TIMEOUT_SECS),
            deadline: Some(Duration::from_secs(ENRICH_DEADLINE_SECS)),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let deadline_secs = parse_var("ENRICH_DEADLINE_SECS", ENRICH_DEADLINE_SECS)?;
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            ebay_api_url: std::env::var("EBAY_API_URL")
                .unwrap_or_else(|_| EBAY_API_URL.to_string()),
            ebay_token: non_empty_var("EBAY_OAUTH_TOKEN"),
            search_limit: parse_var("SEARCH_LIMIT", SEARCH_LIMIT)?,
            serpapi_url: std::env::var("SERPAPI_URL").unwrap_or_else(|_| SERPAPI_URL.to_string()),
            serpapi_key: non_empty_var("SERPAPI_KEY"),
            reference_domain_hint: std::env::var("REFERENCE_DOMAIN_HINT")
                .unwrap_or_else(|_| REFERENCE_DOMAIN_HINT.to_string()),
            reference_path_pattern: std::env::var("REFERENCE_PATH_PATTERN")
                .unwrap_or_else(|_| REFERENCE_PATH_PATTERN.to_string()),
            enrich: EnrichConfig {
                workers: parse_var("ENRICH_WORKERS", ENRICH_WORKERS)?,
                discovery_timeout: Duration::from_secs(parse_var(
                    "DISCOVERY_TIMEOUT_SECS",
                    DISCOVERY_TIMEOUT_SECS,
                )?),
                extraction_timeout: Duration::from_secs(parse_var(
                    "EXTRACTION_TIMEOUT_SECS",
                    EXTRACTION_TIMEOUT_SECS,
                )?),
                // 0 disables the overall deadline
                deadline: (deadline_secs > 0).then(|| Duration::from_secs(deadline_secs)),
            },
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{name} must be a non-negative integer"))),
        Err(_) => Ok(default),
    }
}
