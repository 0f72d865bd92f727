pub mod config;
pub mod enricher;
pub mod error;
pub mod fetcher;
pub mod grading;
pub mod pipeline;
pub mod query;
pub mod report;
pub mod resolver;
pub mod source;
pub mod state;
pub mod types;
