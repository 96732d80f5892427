//! Per-user portfolio sentiment runs.
//!
//! [`SentimentPipeline`] is the pure core: articles and holdings in, one
//! [`PortfolioReport`](analysis_core::PortfolioReport) out. [`PipelineService`]
//! fans that out across users and handles history and delivery.

pub mod config;
pub mod pipeline;
pub mod service;

pub use config::{parse_source_weights, PipelineConfig};
pub use pipeline::{SentimentPipeline, UserRunInput};
pub use service::{PipelineService, RunSummary, UserFailure};
