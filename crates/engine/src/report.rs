//! Leaderboard message formatting (Telegram Markdown)

use crate::ranking::cmp_nan_lowest;
use crate::types::RankedPool;

pub const DEFAULT_REPORT_SIZE: usize = 10;

const POOL_INFO_URL: &str = "https://info.uniswap.org/#/pools/";
const PRICE_CHART_URL: &str = "https://dexscreener.com/ethereum/";
const HEADER: &str = "Pair\t\t|\t\tVolatility\t\t|\t\tTx\t\t|\t\tFees2TVL";

/// The best `k` pools by ranking (input must already be ranking-sorted)
pub fn top_k(ranked: &[RankedPool], k: usize) -> &[RankedPool] {
    &ranked[..k.min(ranked.len())]
}

fn non_finite_label(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("nan")
    } else if value == f64::INFINITY {
        Some("inf")
    } else if value == f64::NEG_INFINITY {
        Some("-inf")
    } else {
        None
    }
}

/// C-style `%.1e`: one digit after the point, signed exponent of at least two digits
pub fn format_scientific(value: f64) -> String {
    if let Some(label) = non_finite_label(value) {
        return label.to_string();
    }
    let formatted = format!("{:.1e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => formatted,
    }
}

/// Shortest round-trip decimal form, keeping a `.0` on whole numbers
pub fn format_ratio(value: f64) -> String {
    if let Some(label) = non_finite_label(value) {
        label.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

fn format_count(value: f64) -> String {
    if value.is_finite() {
        format!("{:.0}", value)
    } else {
        format_ratio(value)
    }
}

/// Render the leaderboard, ordered by fees-to-TVL (highest first, missing last)
pub fn format_report(pools: &[RankedPool]) -> String {
    let mut rows: Vec<&RankedPool> = pools.iter().collect();
    rows.sort_by(|a, b| cmp_nan_lowest(b.metrics.fees_to_tvl, a.metrics.fees_to_tvl));

    let mut msg = String::from(HEADER);
    for row in rows {
        let m = &row.metrics;
        let id = &m.pool.id;
        msg.push('\n');
        msg.push_str(&format!(
            " [{pair}]({info}{id})| \u{1F4C9} [{vol}]({chart}{id}) | \u{1F9EE} {tx} | \u{1F4B8} [{fees}]({info}{id})",
            pair = m.pool.pair(),
            info = POOL_INFO_URL,
            chart = PRICE_CHART_URL,
            id = id,
            vol = format_scientific(m.volatility),
            tx = format_count(m.tx_count),
            fees = format_ratio(m.fees_to_tvl),
        ));
    }
    msg
}
