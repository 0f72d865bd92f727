pub mod classifier;
pub mod merger;
pub mod sink;

pub use merger::{merge, merge_all, rank, RankOrder};
pub use sink::{ReportSink, TextReportSink};
