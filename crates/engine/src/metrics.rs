//! Metrics aggregation — reduce a pool's daily snapshot window to one row
//!
//! Per-row ratios come from the most recent snapshot only; volatility and the
//! trend signals are computed over the whole window. Missing inputs (`NaN`)
//! propagate into every metric derived from them instead of failing.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use ta::indicators::StandardDeviation;
use ta::Next;
use tracing::warn;

use crate::types::{DailySnapshot, Pool, PoolMetrics};

/// Round half-to-even to `dp` decimal places, applied to the exact binary value
/// (so `2.675` rounds to `2.67`, being stored just below the midpoint).
/// Non-finite values pass through.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    match Decimal::from_f64_retain(value) {
        Some(d) => d.round_dp(dp).to_f64().unwrap_or(value),
        // Too small to represent: rounds to zero at any useful precision
        None if value.abs() < 1.0 => 0.0_f64.copysign(value),
        // Outside Decimal's range: already far beyond the requested precision
        None => value,
    }
}

/// Population standard deviation (divides by N). `NaN` for an empty slice or
/// when any value is missing.
pub fn population_std_dev(values: &[f64]) -> f64 {
    let Ok(mut sd) = StandardDeviation::new(values.len()) else {
        return f64::NAN;
    };
    values.iter().fold(f64::NAN, |_, &v| sd.next(v))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Aggregate a window of snapshots (most recent first) into [`PoolMetrics`].
///
/// Returns `None` for an empty window: the pool has no qualifying history.
pub fn aggregate(pool: &Pool, window: &[DailySnapshot]) -> Option<PoolMetrics> {
    let latest = window.first()?;

    let closes: Vec<f64> = window.iter().map(|s| s.close).collect();
    let volatility = population_std_dev(&closes);

    // Comparison is false for NaN, so a missing tx count disables the signal
    let tx_total: f64 = window.iter().map(|s| s.tx_count).sum();
    let tx_trend = if tx_total > 0.0 {
        tx_total / window.len() as f64 - latest.tx_count
    } else {
        0.0
    };
    let vol_trend = mean(window.iter().map(|s| s.volume_usd)) - latest.volume_usd;
    let tvl_trend = mean(window.iter().map(|s| s.tvl_usd)) - latest.tvl_usd;

    let metrics = PoolMetrics {
        pool: pool.clone(),
        date: latest.date,
        tvl_usd: latest.tvl_usd,
        volume_usd: latest.volume_usd,
        fees_usd: latest.fees_usd,
        tx_count: latest.tx_count,
        close: latest.close,
        fee_tier: round_dp(latest.fees_usd * 100.0 / latest.volume_usd, 2),
        tvl_to_vol: latest.tvl_usd / latest.volume_usd,
        fees_to_tvl: round_dp(latest.fees_usd * 100.0 / latest.tvl_usd, 3),
        volatility,
        tx_trend,
        vol_trend,
        tvl_trend,
    };

    if has_anomaly(&metrics) {
        warn!(pool = %pool.id, pair = %pool.pair(), "Pool has missing or non-finite metrics");
    }

    Some(metrics)
}

fn has_anomaly(m: &PoolMetrics) -> bool {
    [
        m.fee_tier,
        m.tvl_to_vol,
        m.fees_to_tvl,
        m.volatility,
        m.tx_trend,
        m.vol_trend,
        m.tvl_trend,
    ]
    .iter()
    .any(|v| !v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(date: i64, tvl: f64, volume: f64, fees: f64, tx: f64, close: f64) -> DailySnapshot {
        DailySnapshot {
            pool_id: "0xpool".into(),
            date,
            tvl_usd: tvl,
            volume_usd: volume,
            fees_usd: fees,
            liquidity: 1.0e18,
            tx_count: tx,
            high: close * 1.01,
            low: close * 0.99,
            close,
        }
    }

    fn pool() -> Pool {
        Pool::new("0xpool", "USDC", "WETH")
    }

    #[test]
    fn test_round_dp_half_even() {
        assert_eq!(round_dp(0.125, 2), 0.12);
        assert_eq!(round_dp(0.135, 2), 0.14);
        assert_eq!(round_dp(0.05, 3), 0.05);
        assert_eq!(round_dp(2.499999, 2), 2.5);
        // Stored just below the midpoint
        assert_eq!(round_dp(2.675, 2), 2.67);
        assert_eq!(round_dp(0.1235, 3), 0.123);
        // Stored just above the midpoint
        assert_eq!(round_dp(0.0125, 3), 0.013);
        assert!(round_dp(f64::NAN, 2).is_nan());
        assert_eq!(round_dp(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn test_population_std_dev() {
        let sd = population_std_dev(&[90.0, 95.0, 100.0, 105.0, 110.0]);
        assert!((sd - 50f64.sqrt()).abs() < 1e-9);
        assert_eq!(population_std_dev(&[50.0; 5]), 0.0);
        assert_eq!(population_std_dev(&[42.0]), 0.0);
        assert!(population_std_dev(&[]).is_nan());
        assert!(population_std_dev(&[1.0, f64::NAN, 3.0]).is_nan());
    }

    #[test]
    fn test_aggregate_uses_latest_row() {
        let window = vec![
            snapshot(500, 2_000_000.0, 500_000.0, 1000.0, 100.0, 90.0),
            snapshot(400, 1_900_000.0, 600_000.0, 1200.0, 120.0, 95.0),
            snapshot(300, 1_800_000.0, 700_000.0, 1400.0, 140.0, 100.0),
            snapshot(200, 1_700_000.0, 800_000.0, 1600.0, 160.0, 105.0),
            snapshot(100, 1_600_000.0, 900_000.0, 1800.0, 180.0, 110.0),
        ];
        let m = aggregate(&pool(), &window).unwrap();

        assert_eq!(m.date, 500);
        assert_eq!(m.fee_tier, 0.2);
        assert_eq!(m.tvl_to_vol, 4.0);
        assert_eq!(m.fees_to_tvl, 0.05);
        assert!((m.volatility - 7.0710678118654755).abs() < 1e-9);
        // mean(tx) = 140, latest = 100
        assert_eq!(m.tx_trend, 40.0);
        // mean(volume) = 700_000, latest = 500_000
        assert_eq!(m.vol_trend, 200_000.0);
        // mean(tvl) = 1_800_000, latest = 2_000_000
        assert_eq!(m.tvl_trend, -200_000.0);
        assert_eq!(m.tx_count, 100.0);
    }

    #[test]
    fn test_single_snapshot_window() {
        let window = vec![snapshot(100, 1_000_000.0, 200_000.0, 5000.0, 77.0, 50.0)];
        let m = aggregate(&pool(), &window).unwrap();

        assert_eq!(m.volatility, 0.0);
        assert_eq!(m.tx_trend, 0.0);
        assert_eq!(m.vol_trend, 0.0);
        assert_eq!(m.tvl_trend, 0.0);
        assert_eq!(m.fee_tier, 2.5);
        assert_eq!(m.fees_to_tvl, 0.5);
        assert_eq!(m.tvl_to_vol, 5.0);
    }

    #[test]
    fn test_empty_window() {
        assert!(aggregate(&pool(), &[]).is_none());
    }

    #[test]
    fn test_zero_tx_total_disables_tx_trend() {
        let window = vec![
            snapshot(200, 1.0, 1.0, 1.0, 0.0, 1.0),
            snapshot(100, 1.0, 1.0, 1.0, 0.0, 1.0),
        ];
        assert_eq!(aggregate(&pool(), &window).unwrap().tx_trend, 0.0);
    }

    #[test]
    fn test_missing_values_propagate() {
        let mut latest = snapshot(200, 1_000_000.0, 100_000.0, 300.0, f64::NAN, 10.0);
        latest.close = f64::NAN;
        let window = vec![latest, snapshot(100, 900_000.0, 110_000.0, 320.0, 12.0, 11.0)];
        let m = aggregate(&pool(), &window).unwrap();

        assert!(m.volatility.is_nan());
        assert_eq!(m.tx_trend, 0.0);
        assert_eq!(m.fee_tier, 0.3);
        assert!(m.vol_trend.is_finite());
    }

    #[test]
    fn test_zero_volume_and_tvl() {
        let window = vec![snapshot(100, 0.0, 0.0, 0.0, 3.0, 1.0)];
        let m = aggregate(&pool(), &window).unwrap();

        assert!(m.fee_tier.is_nan());
        assert!(m.tvl_to_vol.is_nan());
        assert!(m.fees_to_tvl.is_nan());

        let window = vec![snapshot(100, 10.0, 0.0, 1.0, 3.0, 1.0)];
        let m = aggregate(&pool(), &window).unwrap();
        assert_eq!(m.tvl_to_vol, f64::INFINITY);
        assert_eq!(m.fee_tier, f64::INFINITY);
    }
}
