//! Collectors backed by the fundamentals provider: insider trades, ETF
//! constituents, the S&P 500 stock universe and placeholder enrichment.

use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use crate::api::{FmpDcf, FmpInsiderTrade, FmpRatiosTtm, FundamentalsProvider};
use crate::database::DatabaseManager;
use crate::models::{EtfHolding, InsiderTrade, ValuationMetrics};

const UNKNOWN_INSIDER: &str = "Unknown";

/// Map a feed entry to a stored trade. Entries without a symbol or a
/// parseable transaction date are dropped.
pub fn to_insider_trade(raw: &FmpInsiderTrade) -> Option<InsiderTrade> {
    let symbol = raw.symbol.as_deref().map(str::trim).filter(|s| !s.is_empty())?.to_uppercase();
    let transaction_date = raw.transaction_date.as_deref().and_then(parse_feed_date)?;

    Some(InsiderTrade {
        company: raw
            .company
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| symbol.clone()),
        reporting_date: raw.filing_date.as_deref().and_then(parse_feed_date),
        insider_name: raw
            .reporting_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_INSIDER)
            .to_string(),
        transaction_type: raw.transaction_type.clone(),
        securities_transacted: raw.securities_transacted.unwrap_or(0.0),
        price: raw.price,
        securities_owned: raw.securities_owned,
        filing_url: raw.link.clone(),
        symbol,
        transaction_date,
    })
}

/// Feed dates come as `YYYY-MM-DD` or `YYYY-MM-DD hh:mm:ss`
fn parse_feed_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsiderSummary {
    pub fetched: usize,
    pub invalid: usize,
    pub inserted: usize,
}

pub struct InsiderCollector {
    database: DatabaseManager,
    provider: Arc<dyn FundamentalsProvider>,
}

impl InsiderCollector {
    pub fn new(database: DatabaseManager, provider: Arc<dyn FundamentalsProvider>) -> Self {
        Self { database, provider }
    }

    /// Fetch one feed page and store the trades not seen before
    pub async fn collect_page(&self, page: u32) -> Result<InsiderSummary> {
        info!("📥 Fetching insider trades (page {})", page);
        let feed = self.provider.insider_feed(page).await?;

        let mut summary = InsiderSummary {
            fetched: feed.len(),
            ..Default::default()
        };

        for raw in &feed {
            let Some(trade) = to_insider_trade(raw) else {
                debug!("Skipping insider entry without symbol or date: {:?}", raw);
                summary.invalid += 1;
                continue;
            };
            match self.database.insert_insider_trade(&trade).await {
                Ok(true) => summary.inserted += 1,
                Ok(false) => {}
                Err(e) => error!("❌ Failed to store insider trade for {}: {}", trade.symbol, e),
            }
        }

        info!("✅ {} new insider trades ({} fetched)", summary.inserted, summary.fetched);
        Ok(summary)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EtfSummary {
    pub updated: usize,
    pub empty: usize,
    pub failed: usize,
}

pub struct EtfCollector {
    database: DatabaseManager,
    provider: Arc<dyn FundamentalsProvider>,
}

impl EtfCollector {
    pub fn new(database: DatabaseManager, provider: Arc<dyn FundamentalsProvider>) -> Self {
        Self { database, provider }
    }

    /// Refresh the constituent snapshot of each ETF
    pub async fn collect(&self, symbols: &[String]) -> EtfSummary {
        let mut summary = EtfSummary::default();

        for symbol in symbols {
            let holdings = match self.provider.etf_holders(symbol).await {
                Ok(holdings) => holdings,
                Err(e) => {
                    warn!("❌ Failed to fetch holdings for {}: {}", symbol, e);
                    summary.failed += 1;
                    continue;
                }
            };
            if holdings.is_empty() {
                warn!("⚠️ No holdings returned for {}", symbol);
                summary.empty += 1;
                continue;
            }

            let count = holdings.len();
            let snapshot = EtfHolding {
                symbol: symbol.clone(),
                holdings: serde_json::Value::Array(holdings),
                last_updated: Utc::now(),
            };
            match self.database.upsert_etf_holdings(&snapshot).await {
                Ok(()) => {
                    info!("✅ Stored {} holdings for {}", count, symbol);
                    summary.updated += 1;
                }
                Err(e) => {
                    error!("❌ Failed to store holdings for {}: {}", symbol, e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub candidates: usize,
    pub updated: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Replaces placeholder stock rows with real company profiles
pub struct StockEnricher {
    database: DatabaseManager,
    provider: Arc<dyn FundamentalsProvider>,
}

impl StockEnricher {
    pub fn new(database: DatabaseManager, provider: Arc<dyn FundamentalsProvider>) -> Self {
        Self { database, provider }
    }

    pub async fn enrich_placeholders(&self) -> Result<EnrichSummary> {
        let symbols = self.database.placeholder_stocks().await?;
        info!("🔍 {} placeholder stocks to enrich", symbols.len());

        let mut summary = EnrichSummary {
            candidates: symbols.len(),
            ..Default::default()
        };

        for symbol in &symbols {
            match self.provider.company_profile(symbol).await {
                Ok(Some(profile)) => {
                    self.database.update_stock_profile(symbol, &profile).await?;
                    debug!("Enriched {}: {:?}", symbol, profile.name);
                    summary.updated += 1;
                }
                Ok(None) => {
                    warn!("⚠️ No profile for {}", symbol);
                    summary.missing += 1;
                }
                Err(e) => {
                    warn!("❌ Profile lookup failed for {}: {}", symbol, e);
                    summary.failed += 1;
                }
            }
        }

        info!("✅ Enriched {} of {} stocks", summary.updated, summary.candidates);
        Ok(summary)
    }
}

/// Combine TTM ratios and the DCF estimate; either side may be missing
pub fn valuation_metrics(ratios: Option<&FmpRatiosTtm>, dcf: Option<&FmpDcf>) -> ValuationMetrics {
    let ratios = ratios.cloned().unwrap_or_default();
    let dcf = dcf.cloned().unwrap_or_default();

    ValuationMetrics {
        dcf: dcf.dcf,
        stock_price: dcf.stock_price,
        pe_ratio_ttm: ratios.pe_ratio,
        pb_ratio_ttm: ratios.price_to_book,
        div_yield_ttm: ratios.dividend_yield,
        dividend_yield_pct: ratios
            .dividend_yield_percentage
            .or(ratios.dividend_yield.map(|y| (y * 10_000.0).round() / 100.0)),
        dps_ttm: ratios.dividend_per_share,
        ev_ebitda_ttm: ratios.enterprise_value_multiple,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniverseSummary {
    pub constituents: usize,
    pub updated: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Refreshes profile and valuation data for every S&P 500 member
pub struct StockUniverseCollector {
    database: DatabaseManager,
    provider: Arc<dyn FundamentalsProvider>,
}

impl StockUniverseCollector {
    pub fn new(database: DatabaseManager, provider: Arc<dyn FundamentalsProvider>) -> Self {
        Self { database, provider }
    }

    /// Walk the constituent list, optionally only its first `limit` symbols.
    /// A failed constituent list aborts; a failed symbol is counted and skipped.
    pub async fn collect(&self, limit: Option<usize>) -> Result<UniverseSummary> {
        info!("📥 Fetching S&P 500 constituents");
        let mut symbols = self.provider.sp500_constituents().await?;
        if let Some(limit) = limit {
            symbols.truncate(limit);
        }

        let mut summary = UniverseSummary {
            constituents: symbols.len(),
            ..Default::default()
        };

        for (i, symbol) in symbols.iter().enumerate() {
            debug!("[{}/{}] {}", i + 1, symbols.len(), symbol);

            let profile = match self.provider.company_profile(symbol).await {
                Ok(Some(profile)) => profile,
                Ok(None) => {
                    warn!("⚠️ No profile for {}", symbol);
                    summary.missing += 1;
                    continue;
                }
                Err(e) => {
                    warn!("❌ Profile lookup failed for {}: {}", symbol, e);
                    summary.failed += 1;
                    continue;
                }
            };

            // Ratios and DCF are optional extras; a failure leaves those fields empty
            let ratios = self.provider.ratios_ttm(symbol).await.unwrap_or_else(|e| {
                warn!("⚠️ Ratios unavailable for {}: {}", symbol, e);
                None
            });
            let dcf = self.provider.discounted_cash_flow(symbol).await.unwrap_or_else(|e| {
                warn!("⚠️ DCF unavailable for {}: {}", symbol, e);
                None
            });
            let metrics = valuation_metrics(ratios.as_ref(), dcf.as_ref());

            match self.database.upsert_stock_data(symbol, &profile, &metrics).await {
                Ok(()) => summary.updated += 1,
                Err(e) => {
                    error!("❌ Failed to store {}: {}", symbol, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "✅ Updated {} of {} stocks ({} without profile, {} failed)",
            summary.updated, summary.constituents, summary.missing, summary.failed
        );
        Ok(summary)
    }
}
