use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::api::MarketData;
use crate::models::PriceBar;

/// Days of history averaged into the reference price
pub const AVERAGE_WINDOW_DAYS: i64 = 90;

/// Estimates a reference buy price for a position
pub struct PriceEstimator {
    market: Arc<dyn MarketData>,
}

impl PriceEstimator {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }

    /// Mean daily close over the quarter ending at `period_end`
    pub async fn quarter_average_price(&self, symbol: &str, period_end: NaiveDate) -> Option<f64> {
        let start = period_end - Duration::days(AVERAGE_WINDOW_DAYS);
        match self.market.daily_history(symbol, start, period_end).await {
            Ok(bars) => mean_close(&bars, start, period_end),
            Err(e) => {
                warn!("❌ Error fetching price history for {}: {}", symbol, e);
                None
            }
        }
    }

    pub async fn latest_price(&self, symbol: &str) -> Option<f64> {
        match self.market.latest_price(symbol).await {
            Ok(price) => price.filter(|p| p.is_finite() && *p > 0.0),
            Err(e) => {
                warn!("❌ Error fetching latest price for {}: {}", symbol, e);
                None
            }
        }
    }

    /// Quarter average, else the latest price, else 0.0
    pub async fn estimate(&self, symbol: &str, period_end: NaiveDate) -> f64 {
        if let Some(avg) = self.quarter_average_price(symbol, period_end).await {
            return avg;
        }
        debug!("No history for {} around {}, using latest price", symbol, period_end);
        self.latest_price(symbol).await.unwrap_or(0.0)
    }
}

/// Average of the usable closes dated within `[start, end]`. Adjusted closes
/// are preferred; non-positive and non-finite values are ignored.
pub fn mean_close(bars: &[PriceBar], start: NaiveDate, end: NaiveDate) -> Option<f64> {
    let closes: Vec<f64> = bars
        .iter()
        .filter(|bar| bar.date >= start && bar.date <= end)
        .filter_map(|bar| bar.adj_close.or(bar.close))
        .filter(|close| close.is_finite() && *close > 0.0)
        .collect();

    if closes.is_empty() {
        return None;
    }
    Some(closes.iter().sum::<f64>() / closes.len() as f64)
}
