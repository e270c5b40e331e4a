//! Typed records passed between the pipeline stages

use serde::{Deserialize, Serialize};

/// A liquidity pool returned by the top-pools query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub token0_symbol: String,
    pub token1_symbol: String,
}

impl Pool {
    pub fn new(
        id: impl Into<String>,
        token0_symbol: impl Into<String>,
        token1_symbol: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            token0_symbol: token0_symbol.into(),
            token1_symbol: token1_symbol.into(),
        }
    }

    /// Trading pair label, e.g. `USDC/WETH`
    pub fn pair(&self) -> String {
        format!("{}/{}", self.token0_symbol, self.token1_symbol)
    }
}

/// One daily bucket of pool activity.
///
/// Numeric fields that could not be coerced from the indexer's string values
/// are `NaN` and propagate as missing through every derived metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub pool_id: String,
    /// Unix timestamp (seconds) of the start of the day
    pub date: i64,
    pub tvl_usd: f64,
    pub volume_usd: f64,
    pub fees_usd: f64,
    pub liquidity: f64,
    pub tx_count: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Derived metrics for one pool: the most recent snapshot plus window-level aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolMetrics {
    pub pool: Pool,
    /// Date of the most recent snapshot in the window
    pub date: i64,
    pub tvl_usd: f64,
    pub volume_usd: f64,
    pub fees_usd: f64,
    pub tx_count: f64,
    pub close: f64,
    /// Fees as a percentage of volume, 2 decimal places
    pub fee_tier: f64,
    pub tvl_to_vol: f64,
    /// Fees as a percentage of TVL, 3 decimal places
    pub fees_to_tvl: f64,
    /// Population standard deviation of `close` over the window
    pub volatility: f64,
    pub tx_trend: f64,
    pub vol_trend: f64,
    pub tvl_trend: f64,
}

/// Pool metrics with the composite ranking score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPool {
    #[serde(flatten)]
    pub metrics: PoolMetrics,
    pub ranking: f64,
}
