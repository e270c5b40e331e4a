//! Ranking engine — composite score from per-column ranks
//!
//! Each metric column is rank-transformed across all pools independently
//! (average ranks for ties, rank 1 = lowest), multiplied by a fixed weight,
//! and summed. Higher `ranking` is better.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{PoolMetrics, RankedPool};

/// A metric column that takes part in the ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RankColumn {
    /// `1 / tvl_to_vol`: more volume per locked dollar is better
    TvlToVolInv,
    /// `1 / volatility`: a calmer price is better
    VolatilityInv,
    FeesToTvl,
    TxTrend,
    VolTrend,
    TvlTrend,
}

impl RankColumn {
    pub const ALL: [RankColumn; 6] = [
        Self::TvlToVolInv,
        Self::VolatilityInv,
        Self::FeesToTvl,
        Self::TxTrend,
        Self::VolTrend,
        Self::TvlTrend,
    ];

    pub fn value(&self, m: &PoolMetrics) -> f64 {
        match self {
            Self::TvlToVolInv => 1.0 / m.tvl_to_vol,
            Self::VolatilityInv => 1.0 / m.volatility,
            Self::FeesToTvl => m.fees_to_tvl,
            Self::TxTrend => m.tx_trend,
            Self::VolTrend => m.vol_trend,
            Self::TvlTrend => m.tvl_trend,
        }
    }
}

/// Weight applied to each column's rank before summing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub tvl_to_vol_inv: f64,
    pub volatility_inv: f64,
    pub fees_to_tvl: f64,
    pub tx_trend: f64,
    pub vol_trend: f64,
    pub tvl_trend: f64,
}

impl Default for RankingWeights {
    /// Fee yield on locked capital dominates; capital efficiency counts double;
    /// volatility and trends only separate near-ties.
    fn default() -> Self {
        Self {
            tvl_to_vol_inv: 2.0,
            volatility_inv: 1.0,
            fees_to_tvl: 50.0,
            tx_trend: 1.0,
            vol_trend: 1.0,
            tvl_trend: 1.0,
        }
    }
}

impl RankingWeights {
    pub fn weight(&self, column: RankColumn) -> f64 {
        match column {
            RankColumn::TvlToVolInv => self.tvl_to_vol_inv,
            RankColumn::VolatilityInv => self.volatility_inv,
            RankColumn::FeesToTvl => self.fees_to_tvl,
            RankColumn::TxTrend => self.tx_trend,
            RankColumn::VolTrend => self.vol_trend,
            RankColumn::TvlTrend => self.tvl_trend,
        }
    }
}

/// Ascending order with `NaN` below every number (including `-inf`)
pub(crate) fn cmp_nan_lowest(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// 1-based ascending ranks; tied values share the mean of the ranks they span.
///
/// Missing values form the lowest block and tie among themselves.
pub fn average_rank(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| cmp_nan_lowest(values[a], values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && cmp_nan_lowest(values[order[start]], values[order[end]]) == Ordering::Equal
        {
            end += 1;
        }
        // Positions start..end hold ranks start+1..=end
        let avg = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = avg;
        }
        start = end;
    }
    ranks
}

/// Score every pool and sort by `ranking` descending (stable: ties keep input order)
pub fn rank_pools(pools: Vec<PoolMetrics>, weights: &RankingWeights) -> Vec<RankedPool> {
    let mut scores = vec![0.0; pools.len()];

    for column in RankColumn::ALL {
        let values: Vec<f64> = pools.iter().map(|m| column.value(m)).collect();
        let weight = weights.weight(column);
        for (score, rank) in scores.iter_mut().zip(average_rank(&values)) {
            *score += rank * weight;
        }
    }

    let mut ranked: Vec<RankedPool> = pools
        .into_iter()
        .zip(scores)
        .map(|(metrics, ranking)| RankedPool { metrics, ranking })
        .collect();
    ranked.sort_by(|a, b| b.ranking.partial_cmp(&a.ranking).unwrap_or(Ordering::Equal));
    ranked
}
