pub mod latency;
pub mod result_store;

pub use latency::{Percentiles, ResolutionLatency};
pub use result_store::ResultStore;
