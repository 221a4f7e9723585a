//! Cross-source price consensus

use crate::catalog::money_round;
use crate::config::{AggregateMethod, AggregatorConfig};

/// Combine per-source quotes into one price. Returns `None` below the
/// `minSources` quorum. The result is clamped to the configured range
/// and rounded to cents.
pub fn aggregate(quotes: &[f64], cfg: &AggregatorConfig) -> Option<f64> {
    if quotes.len() < cfg.min_sources {
        return None;
    }

    let value = match cfg.method {
        AggregateMethod::Mean => quotes.iter().sum::<f64>() / quotes.len() as f64,
        AggregateMethod::Median => median(quotes),
    };

    Some(money_round(value.clamp(cfg.clamp_min, cfg.clamp_max)))
}

fn median(quotes: &[f64]) -> f64 {
    let mut sorted = quotes.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
