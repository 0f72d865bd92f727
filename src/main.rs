use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use auction_arb::config::Config;
use auction_arb::enricher::Enricher;
use auction_arb::error::{AppError, Result};
use auction_arb::pipeline::{Pipeline, RunOptions};
use auction_arb::report::{RankOrder, ReportSink, TextReportSink};
use auction_arb::resolver::ReferenceResolver;
use auction_arb::source::{EbayBrowseClient, PriceChartingExtractor, SerpDiscovery};
use auction_arb::types::BuyingOption;

#[derive(Parser, Debug)]
#[command(name = "arb")]
#[command(about = "Compare auction listings against price-guide reference prices")]
struct Args {
    /// Keyword text, a listing link (/itm/<id>) or a search-results link
    input: String,

    /// Buying option for keyword searches (search links keep their own filters)
    #[arg(long, value_enum)]
    buying: Option<BuyingArg>,

    /// Report row order
    #[arg(long, value_enum, default_value = "ingested")]
    sort: SortArg,

    /// Enrichment worker count (overrides ENRICH_WORKERS)
    #[arg(long)]
    workers: Option<usize>,

    /// Keep only the first N listings
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BuyingArg {
    Auction,
    BuyNow,
    Any,
}

impl From<BuyingArg> for BuyingOption {
    fn from(arg: BuyingArg) -> Self {
        match arg {
            BuyingArg::Auction => BuyingOption::Auction,
            BuyingArg::BuyNow => BuyingOption::FixedPrice,
            BuyingArg::Any => BuyingOption::Any,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
    Ending,
    Profit,
    Ingested,
}

impl From<SortArg> for RankOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Ending => RankOrder::EndingSoonest,
            SortArg::Profit => RankOrder::ProfitDescending,
            SortArg::Ingested => RankOrder::AsIngested,
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(workers) = args.workers {
        cfg.enrich.workers = workers;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cfg, args).await {
        match &e {
            AppError::AuthExpired(_) => {
                error!("Listing source rejected the token: {e}. Refresh EBAY_OAUTH_TOKEN.")
            }
            _ => error!("Fatal error: {e}"),
        }
        std::process::exit(1);
    }
}

async fn run(cfg: Config, args: Args) -> Result<()> {
    let token = cfg
        .ebay_token
        .as_deref()
        .ok_or_else(|| AppError::Config("EBAY_OAUTH_TOKEN is not set".to_string()))?;
    let serp_key = cfg
        .serpapi_key
        .as_deref()
        .ok_or_else(|| AppError::Config("SERPAPI_KEY is not set".to_string()))?;

    let source = Arc::new(EbayBrowseClient::new(&cfg.ebay_api_url, token, cfg.search_limit)?);
    let discovery = Arc::new(SerpDiscovery::new(&cfg.serpapi_url, serp_key)?);
    let extractor = Arc::new(PriceChartingExtractor::new()?);

    let resolver = ReferenceResolver::new(discovery, extractor, &cfg.enrich)
        .with_reference_domain(&cfg.reference_domain_hint, &cfg.reference_path_pattern);
    let enricher = Enricher::new(Arc::new(resolver), cfg.enrich.clone());
    let pipeline = Pipeline::new(source, enricher);

    let opts = RunOptions {
        order: args.sort.into(),
        buying_option: args.buying.map(Into::into),
        limit: args.limit,
    };
    let report = pipeline.run(&args.input, opts).await?;

    info!(
        rows = report.rows.len(),
        api_total = report.fetch_stats.api_total,
        found = report.enrich_stats.found,
        found_fallback = report.enrich_stats.found_fallback,
        not_found = report.enrich_stats.not_found,
        failed = report.enrich_stats.failed,
        timed_out = report.enrich_stats.timed_out,
        "Report ready"
    );

    let mut sink = TextReportSink::new(std::io::stdout().lock());
    sink.emit(&report.rows)
}
