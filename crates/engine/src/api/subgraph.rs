//! Uniswap V3 subgraph client (GraphQL over HTTPS, no authentication)
//!
//! Two queries: the top pools by volume, and the last few daily snapshots of
//! one pool. Any transport, status, or decoding failure is a [`FetchError`].

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::types::{DailySnapshot, Pool};

pub const DEFAULT_SUBGRAPH_URL: &str =
    "https://api.thegraph.com/subgraphs/name/uniswap/uniswap-v3";

/// The indexer refuses `first` values above this
const MAX_PAGE_SIZE: u32 = 1000;
/// Daily snapshots requested per pool
pub const SNAPSHOT_WINDOW: u32 = 5;
const SECONDS_PER_DAY: i64 = 86_400;

const TOP_POOLS_QUERY: &str = r#"query pools($first: Int, $skip: Int, $minVolume: BigDecimal) {
  pools(first: $first, skip: $skip, orderBy: volumeUSD, orderDirection: desc,
        where: {volumeUSD_gt: $minVolume}) {
    id
    token0 { symbol }
    token1 { symbol }
  }
}"#;

const POOL_DAY_DATAS_QUERY: &str = r#"query poolDayDatas($first: Int, $pool: String, $since: Int) {
  poolDayDatas(first: $first, orderBy: date, orderDirection: desc,
               where: {pool: $pool, date_gt: $since, txCount_gt: 0}) {
    pool { id }
    date
    tvlUSD
    volumeUSD
    feesUSD
    liquidity
    txCount
    high
    low
    close
  }
}"#;

// ---------------------------------------------------------------------------
// Deserialization structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PoolsData {
    pools: Vec<RawPool>,
}

#[derive(Debug, Deserialize)]
struct RawToken {
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct RawPool {
    id: String,
    token0: RawToken,
    token1: RawToken,
}

impl From<RawPool> for Pool {
    fn from(raw: RawPool) -> Self {
        Pool::new(raw.id, raw.token0.symbol, raw.token1.symbol)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolDayDatasData {
    pool_day_datas: Vec<RawPoolDayData>,
}

#[derive(Debug, Deserialize)]
struct RawPoolRef {
    id: String,
}

/// The subgraph encodes BigDecimal/BigInt values as strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPoolDayData {
    pool: RawPoolRef,
    date: i64,
    #[serde(rename = "tvlUSD", default)]
    tvl_usd: Value,
    #[serde(rename = "volumeUSD", default)]
    volume_usd: Value,
    #[serde(rename = "feesUSD", default)]
    fees_usd: Value,
    #[serde(default)]
    liquidity: Value,
    #[serde(default)]
    tx_count: Value,
    #[serde(default)]
    high: Value,
    #[serde(default)]
    low: Value,
    #[serde(default)]
    close: Value,
}

impl From<RawPoolDayData> for DailySnapshot {
    fn from(raw: RawPoolDayData) -> Self {
        DailySnapshot {
            pool_id: raw.pool.id,
            date: raw.date,
            tvl_usd: coerce_f64(&raw.tvl_usd),
            volume_usd: coerce_f64(&raw.volume_usd),
            fees_usd: coerce_f64(&raw.fees_usd),
            liquidity: coerce_f64(&raw.liquidity),
            tx_count: coerce_f64(&raw.tx_count),
            high: coerce_f64(&raw.high),
            low: coerce_f64(&raw.low),
            close: coerce_f64(&raw.close),
        }
    }
}

/// Numeric coercion: numbers and numeric strings pass, anything else is missing (`NaN`)
fn coerce_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Decode a GraphQL response body, requiring the `data` key
fn parse_response<T: DeserializeOwned>(body: &str) -> FetchResult<T> {
    let response: GraphQlResponse<T> = serde_json::from_str(body)?;
    let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
    match response.data {
        Some(data) => {
            if !messages.is_empty() {
                warn!(errors = %messages.join("; "), "Subgraph returned partial errors");
            }
            Ok(data)
        }
        None if !messages.is_empty() => Err(FetchError::GraphQl(messages.join("; "))),
        None => Err(FetchError::MissingData),
    }
}

/// Lower bound (exclusive) on snapshot dates: `now - lookback_days` days
pub fn snapshot_cutoff(now: DateTime<Utc>, lookback_days: u32) -> i64 {
    now.timestamp() - SECONDS_PER_DAY * i64::from(lookback_days)
}

// ---------------------------------------------------------------------------
// Client implementation
// ---------------------------------------------------------------------------

/// Uniswap V3 subgraph client
#[derive(Clone)]
pub struct SubgraphClient {
    client: Client,
    url: String,
}

impl Default for SubgraphClient {
    fn default() -> Self {
        Self::new(DEFAULT_SUBGRAPH_URL, Duration::from_secs(30))
    }
}

impl SubgraphClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            url: url.into(),
        }
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> FetchResult<T> {
        let body = json!({ "query": query, "variables": variables });

        let resp = self.client.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let text = resp.text().await?;
        parse_response(&text)
    }

    /// Top `limit` pools with 24h volume above `min_volume_usd`, by descending volume.
    ///
    /// Pages through the result set since the indexer caps `first`.
    pub async fn top_pools(&self, limit: u32, min_volume_usd: f64) -> FetchResult<Vec<Pool>> {
        let client = self;
        let min_volume = min_volume_usd.to_string();
        let pools = paginate(limit, move |first, skip| {
            let variables = json!({
                "first": first,
                "skip": skip,
                "minVolume": min_volume,
            });
            async move {
                let page: PoolsData = client.query(TOP_POOLS_QUERY, variables).await?;
                Ok::<Vec<Pool>, FetchError>(page.pools.into_iter().map(Pool::from).collect())
            }
        })
        .await?;

        debug!(count = pools.len(), "Pools fetched");
        Ok(pools)
    }

    /// Up to [`SNAPSHOT_WINDOW`] daily snapshots of a pool newer than `since`,
    /// most recent first. Days without transactions are excluded by the query.
    pub async fn pool_day_datas(&self, pool_id: &str, since: i64) -> FetchResult<Vec<DailySnapshot>> {
        debug!(pool_id, since, "Fetching daily snapshots");
        let variables = json!({
            "first": SNAPSHOT_WINDOW,
            "pool": pool_id,
            "since": since,
        });
        let data: PoolDayDatasData = self.query(POOL_DAY_DATAS_QUERY, variables).await?;
        Ok(into_snapshots(data))
    }
}

/// `(first, skip)` of the next page, or `None` once `collected` reaches `limit`
fn next_page(limit: u32, collected: u32) -> Option<(u32, u32)> {
    if collected >= limit {
        None
    } else {
        Some(((limit - collected).min(MAX_PAGE_SIZE), collected))
    }
}

/// Collect up to `limit` pools page by page, stopping early on a short page
async fn paginate<F, Fut>(limit: u32, mut fetch_page: F) -> FetchResult<Vec<Pool>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = FetchResult<Vec<Pool>>>,
{
    let mut pools: Vec<Pool> = Vec::new();

    while let Some((first, skip)) = next_page(limit, pools.len() as u32) {
        debug!(first, skip, "Fetching pools page");
        let page = fetch_page(first, skip).await?;
        let received = page.len() as u32;
        pools.extend(page);

        if received < first {
            break;
        }
    }

    pools.truncate(limit as usize);
    Ok(pools)
}

fn into_snapshots(data: PoolDayDatasData) -> Vec<DailySnapshot> {
    let mut snapshots: Vec<DailySnapshot> =
        data.pool_day_datas.into_iter().map(DailySnapshot::from).collect();
    // Stable: equal dates keep the indexer's order
    snapshots.sort_by(|a, b| b.date.cmp(&a.date));
    snapshots
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
