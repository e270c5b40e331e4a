//! Run orchestration: fetch → aggregate → rank → format → deliver
//!
//! The remote services sit behind [`PoolSource`] and [`ReportSink`] so the
//! whole flow runs against in-memory fakes in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::subgraph::{snapshot_cutoff, SubgraphClient};
use crate::api::telegram::{Delivery, TelegramClient};
use crate::error::{FetchError, FetchResult, NotifyError, PipelineError};
use crate::metrics::aggregate;
use crate::ranking::{rank_pools, RankingWeights};
use crate::report::{format_report, top_k, DEFAULT_REPORT_SIZE};
use crate::types::{DailySnapshot, Pool, PoolMetrics, RankedPool};

/// Pools below this 24h volume are ignored by the indexer query
pub const DEFAULT_MIN_VOLUME_USD: f64 = 1_000_000.0;
pub const DEFAULT_LOOKBACK_DAYS: u32 = 5;

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PoolSource: Send + Sync {
    async fn top_pools(&self, limit: u32, min_volume_usd: f64) -> FetchResult<Vec<Pool>>;
    async fn pool_day_datas(&self, pool_id: &str, since: i64) -> FetchResult<Vec<DailySnapshot>>;
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<Delivery, NotifyError>;
}

#[async_trait]
impl PoolSource for SubgraphClient {
    async fn top_pools(&self, limit: u32, min_volume_usd: f64) -> FetchResult<Vec<Pool>> {
        SubgraphClient::top_pools(self, limit, min_volume_usd).await
    }

    async fn pool_day_datas(&self, pool_id: &str, since: i64) -> FetchResult<Vec<DailySnapshot>> {
        SubgraphClient::pool_day_datas(self, pool_id, since).await
    }
}

#[async_trait]
impl ReportSink for TelegramClient {
    async fn deliver(&self, text: &str) -> Result<Delivery, NotifyError> {
        self.send_report(text).await
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub pool_limit: u32,
    pub min_volume_usd: f64,
    pub lookback_days: u32,
    /// Pools shown in the report
    pub report_size: usize,
    /// History requests in flight at once; 1 is fully sequential
    pub fetch_concurrency: usize,
    pub weights: RankingWeights,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            pool_limit: 100,
            min_volume_usd: DEFAULT_MIN_VOLUME_USD,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            report_size: DEFAULT_REPORT_SIZE,
            fetch_concurrency: 1,
            weights: RankingWeights::default(),
        }
    }
}

/// Ranked table and rendered report of one run, before delivery
#[derive(Debug, Clone, Serialize)]
pub struct Leaderboard {
    pub pools_fetched: usize,
    /// Every pool with history, best first
    pub ranked: Vec<RankedPool>,
    /// `None` when no pool had qualifying history
    pub report: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pools_fetched: usize,
    pub pools_ranked: usize,
    pub delivery: Option<Delivery>,
    pub report: Option<String>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Fetch, aggregate, and rank; nothing is sent.
///
/// Any fetch failure aborts the whole run. History requests complete before
/// ranking starts since ranks depend on the full table.
pub async fn build_leaderboard(
    source: &dyn PoolSource,
    options: &RunOptions,
    now: DateTime<Utc>,
) -> FetchResult<Leaderboard> {
    info!(limit = options.pool_limit, min_volume = options.min_volume_usd, "Fetching top pools");
    let pools = source.top_pools(options.pool_limit, options.min_volume_usd).await?;
    let total = pools.len();
    info!(count = total, "Pools fetched, loading daily history");

    let since = snapshot_cutoff(now, options.lookback_days);
    let histories: Vec<(&Pool, Vec<DailySnapshot>)> = stream::iter(pools.iter().enumerate())
        .map(|(i, pool)| async move {
            debug!(current = i + 1, total, pool = %pool.id, "Fetching pool history");
            let snapshots = source.pool_day_datas(&pool.id, since).await?;
            Ok::<_, FetchError>((pool, snapshots))
        })
        .buffered(options.fetch_concurrency.max(1))
        .try_collect()
        .await?;

    let mut table: Vec<PoolMetrics> = Vec::with_capacity(histories.len());
    for (pool, snapshots) in &histories {
        match aggregate(pool, snapshots) {
            Some(metrics) => table.push(metrics),
            None => warn!(pool = %pool.id, pair = %pool.pair(), "No daily history in window, pool dropped"),
        }
    }

    let ranked = rank_pools(table, &options.weights);
    info!(ranked = ranked.len(), dropped = total - ranked.len(), "Pools ranked");

    let report = if ranked.is_empty() {
        None
    } else {
        Some(format_report(top_k(&ranked, options.report_size)))
    };

    Ok(Leaderboard {
        pools_fetched: total,
        ranked,
        report,
    })
}

/// One complete run: build the leaderboard and deliver it
pub async fn run(
    source: &dyn PoolSource,
    sink: &dyn ReportSink,
    options: &RunOptions,
    now: DateTime<Utc>,
) -> Result<RunSummary, PipelineError> {
    let leaderboard = build_leaderboard(source, options, now).await?;

    let delivery = match &leaderboard.report {
        Some(text) => Some(sink.deliver(text).await?),
        None => {
            warn!("No pool had qualifying history, nothing to send");
            None
        }
    };

    Ok(RunSummary {
        pools_fetched: leaderboard.pools_fetched,
        pools_ranked: leaderboard.ranked.len(),
        delivery,
        report: leaderboard.report,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const NOW: i64 = 1_700_432_000;

    #[derive(Default)]
    struct FakeSource {
        pools: Vec<Pool>,
        histories: HashMap<String, Vec<DailySnapshot>>,
        fail_on: Option<String>,
        requests: Mutex<Vec<(String, i64)>>,
    }

    #[async_trait]
    impl PoolSource for FakeSource {
        async fn top_pools(&self, limit: u32, _min_volume_usd: f64) -> FetchResult<Vec<Pool>> {
            Ok(self.pools.iter().take(limit as usize).cloned().collect())
        }

        async fn pool_day_datas(&self, pool_id: &str, since: i64) -> FetchResult<Vec<DailySnapshot>> {
            self.requests.lock().unwrap().push((pool_id.to_string(), since));
            if self.fail_on.as_deref() == Some(pool_id) {
                return Err(FetchError::MissingData);
            }
            Ok(self.histories.get(pool_id).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct FakeSink {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReportSink for FakeSink {
        async fn deliver(&self, text: &str) -> Result<Delivery, NotifyError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(Delivery::Sent)
        }
    }

    fn history(id: &str, closes: [f64; 5], tvl: f64, volume: f64, fees: f64) -> Vec<DailySnapshot> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| DailySnapshot {
                pool_id: id.into(),
                date: NOW - 86_400 * (i as i64 + 1),
                tvl_usd: tvl,
                volume_usd: volume,
                fees_usd: fees,
                liquidity: 1.0,
                tx_count: 100.0,
                high: close,
                low: close,
                close,
            })
            .collect()
    }

    fn source() -> FakeSource {
        let mut histories = HashMap::new();
        histories.insert(
            "0xa".to_string(),
            history("0xa", [90.0, 95.0, 100.0, 105.0, 110.0], 2_000_000.0, 500_000.0, 1000.0),
        );
        histories.insert(
            "0xb".to_string(),
            history("0xb", [50.0; 5], 1_000_000.0, 200_000.0, 5000.0),
        );
        FakeSource {
            pools: vec![
                Pool::new("0xa", "USDC", "WETH"),
                Pool::new("0xempty", "NEW", "WETH"),
                Pool::new("0xb", "WBTC", "WETH"),
            ],
            histories,
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(NOW, 0).unwrap()
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let source = source();
        let sink = FakeSink::default();

        let summary = run(&source, &sink, &RunOptions::default(), now()).await.unwrap();

        assert_eq!(summary.pools_fetched, 3);
        assert_eq!(summary.pools_ranked, 2);
        assert_eq!(summary.delivery, Some(Delivery::Sent));

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let lines: Vec<&str> = sent[0].lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with(" [WBTC/WETH]"));
        assert!(lines[2].starts_with(" [USDC/WETH]"));
        assert!(!sent[0].contains("0xempty"));
    }

    #[tokio::test]
    async fn test_requests_use_lookback_cutoff() {
        let source = source();
        build_leaderboard(&source, &RunOptions::default(), now()).await.unwrap();

        let requests = source.requests.lock().unwrap();
        let ids: Vec<&str> = requests.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["0xa", "0xempty", "0xb"]);
        assert!(requests.iter().all(|(_, since)| *since == NOW - 5 * 86_400));
    }

    #[tokio::test]
    async fn test_ranking_order_in_leaderboard() {
        let leaderboard = build_leaderboard(&source(), &RunOptions::default(), now())
            .await
            .unwrap();
        let ids: Vec<&str> = leaderboard
            .ranked
            .iter()
            .map(|r| r.metrics.pool.id.as_str())
            .collect();
        assert_eq!(ids, vec!["0xb", "0xa"]);
    }

    #[tokio::test]
    async fn test_fetch_error_aborts_without_delivery() {
        let mut source = source();
        source.fail_on = Some("0xb".to_string());
        let sink = FakeSink::default();

        let result = run(&source, &sink, &RunOptions::default(), now()).await;

        assert!(matches!(result, Err(PipelineError::Fetch(FetchError::MissingData))));
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_history_sends_nothing() {
        let source = FakeSource {
            pools: vec![Pool::new("0xempty", "NEW", "WETH")],
            ..Default::default()
        };
        let sink = FakeSink::default();

        let summary = run(&source, &sink, &RunOptions::default(), now()).await.unwrap();

        assert_eq!(summary.pools_ranked, 0);
        assert_eq!(summary.delivery, None);
        assert!(summary.report.is_none());
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_fetch_matches_sequential() {
        let sequential = build_leaderboard(&source(), &RunOptions::default(), now())
            .await
            .unwrap();
        let options = RunOptions {
            fetch_concurrency: 4,
            ..RunOptions::default()
        };
        let concurrent = build_leaderboard(&source(), &options, now()).await.unwrap();

        assert_eq!(sequential.ranked, concurrent.ranked);
        assert_eq!(sequential.report, concurrent.report);
    }

    #[tokio::test]
    async fn test_report_size_limits_rows() {
        let options = RunOptions {
            report_size: 1,
            ..RunOptions::default()
        };
        let leaderboard = build_leaderboard(&source(), &options, now()).await.unwrap();

        assert_eq!(leaderboard.ranked.len(), 2);
        let report = leaderboard.report.unwrap();
        assert_eq!(report.lines().count(), 2);
        assert!(report.contains("WBTC/WETH"));
    }
}
