//! Uniswap V3 pool leaderboard engine
//!
//! Provides:
//! - Subgraph client for top pools and their daily snapshots
//! - Metrics aggregation over a short snapshot window
//! - Weighted rank-sum scoring across pools
//! - Telegram report formatting and delivery

pub mod api;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod ranking;
pub mod report;
pub mod types;

// Re-exports for convenience
pub use api::{Delivery, SubgraphClient, TelegramClient};
pub use error::{FetchError, NotifyError, PipelineError};
pub use metrics::aggregate;
pub use pipeline::{build_leaderboard, run, Leaderboard, PoolSource, ReportSink, RunOptions, RunSummary};
pub use ranking::{average_rank, rank_pools, RankColumn, RankingWeights};
pub use report::{format_report, top_k};
pub use types::*;
