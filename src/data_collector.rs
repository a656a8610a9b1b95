use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::api::{FilingSource, MarketData, SecEdgarClient, SymbolSearch, YahooClient};
use crate::database::DatabaseManager;
use crate::models::{Config, Fund, Holding, InfoTableEntry};
use crate::thirteen_f::{
    fetch_info_table, value_multiplier_for, CollectionMode, FilingLocator, PriceEstimator, TickerResolver,
};

/// Tuning knobs for 13F collection
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub max_holdings_per_filing: usize,
    pub skip_threshold: i64,
    pub filing_delay: Duration,
}

impl CollectorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_holdings_per_filing: config.max_holdings_per_filing,
            skip_threshold: config.skip_threshold,
            filing_delay: Duration::from_secs(config.filing_delay_secs),
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Counters reported after a collection run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub filings_seen: usize,
    pub periods_skipped: usize,
    pub empty_documents: usize,
    pub periods_processed: usize,
    pub holdings_saved: usize,
    pub unresolved: usize,
    pub failed_writes: usize,
}

impl CollectionSummary {
    fn absorb(&mut self, other: &CollectionSummary) {
        self.filings_seen += other.filings_seen;
        self.periods_skipped += other.periods_skipped;
        self.empty_documents += other.empty_documents;
        self.periods_processed += other.periods_processed;
        self.holdings_saved += other.holdings_saved;
        self.unresolved += other.unresolved;
        self.failed_writes += other.failed_writes;
    }
}

/// 13F-HR ingestion: filings -> information tables -> tickers -> prices -> holdings
pub struct ThirteenFCollector {
    database: DatabaseManager,
    filings: Arc<dyn FilingSource>,
    locator: FilingLocator,
    resolver: TickerResolver,
    prices: PriceEstimator,
    settings: CollectorSettings,
}

impl ThirteenFCollector {
    pub fn new(
        database: DatabaseManager,
        filings: Arc<dyn FilingSource>,
        search: Arc<dyn SymbolSearch>,
        market: Arc<dyn MarketData>,
        archive_url: &str,
        settings: CollectorSettings,
    ) -> Self {
        Self {
            database,
            locator: FilingLocator::new(filings.clone(), archive_url),
            filings,
            resolver: TickerResolver::new(search),
            prices: PriceEstimator::new(market),
            settings,
        }
    }

    /// Wire the live SEC and Yahoo clients
    pub fn from_config(config: &Config, database: DatabaseManager) -> Result<Self> {
        let sec = Arc::new(SecEdgarClient::new(config)?);
        let yahoo = Arc::new(YahooClient::new(config)?);

        Ok(Self::new(
            database,
            sec,
            yahoo.clone(),
            yahoo,
            &config.sec_archive_url,
            CollectorSettings::from_config(config),
        ))
    }

    /// Collect every fund in turn; a failing fund is logged and skipped
    pub async fn run_all(&mut self, funds: &[Fund], mode: CollectionMode) -> CollectionSummary {
        let mut total = CollectionSummary::default();

        for (i, fund) in funds.iter().enumerate() {
            info!("📈 [{}/{}] {}", i + 1, funds.len(), fund.name);
            match self.run_for_fund(fund, mode).await {
                Ok(summary) => total.absorb(&summary),
                Err(e) => error!("❌ Collection failed for {}: {}", fund.name, e),
            }
        }

        total
    }

    /// Collect the selected filings of one fund
    pub async fn run_for_fund(&mut self, fund: &Fund, mode: CollectionMode) -> Result<CollectionSummary> {
        info!("📊 Collecting 13F data for {} (CIK {})", fund.name, fund.cik);

        let documents = self.locator.list_filings(&fund.cik, mode).await;
        let mut summary = CollectionSummary {
            filings_seen: documents.len(),
            ..Default::default()
        };

        for document in documents {
            let period = document.report_period;
            let existing = self.database.count_holdings_for_period(fund.id, period).await?;
            if existing > self.settings.skip_threshold {
                info!("⏭️ Skipping {} {}: {} holdings already stored", fund.name, period, existing);
                summary.periods_skipped += 1;
                continue;
            }

            let entries = fetch_info_table(self.filings.as_ref(), &document.url, value_multiplier_for(period)).await;
            if entries.is_empty() {
                warn!("⚠️ No holdings parsed for {} {}", fund.name, period);
                summary.empty_documents += 1;
                continue;
            }
            let mut entries = merge_by_cusip(entries);
            keep_largest(&mut entries, self.settings.max_holdings_per_filing);

            info!("🔄 Processing {} holdings for {} {}", entries.len(), fund.name, period);
            for entry in entries {
                let Some(symbol) = self.resolver.resolve(&entry.name, &entry.cusip).await else {
                    summary.unresolved += 1;
                    continue;
                };

                let avg_buy_price = self.prices.estimate(&symbol, period).await;
                let holding = Holding {
                    id: None,
                    fund_id: fund.id,
                    symbol,
                    report_period: period,
                    shares: entry.shares,
                    value: entry.value,
                    avg_buy_price,
                };

                match self.database.upsert_holding(&holding).await {
                    Ok(()) => {
                        debug!("Saved {} {} ({} shares)", holding.symbol, period, holding.shares);
                        summary.holdings_saved += 1;
                    }
                    Err(e) => {
                        error!("❌ Failed to save {} for {} {}: {}", holding.symbol, fund.name, period, e);
                        summary.failed_writes += 1;
                    }
                }
            }

            summary.periods_processed += 1;
            if !self.settings.filing_delay.is_zero() {
                tokio::time::sleep(self.settings.filing_delay).await;
            }
        }

        info!(
            "✅ {}: {} periods processed, {} skipped, {} holdings saved, {} unresolved",
            fund.name, summary.periods_processed, summary.periods_skipped, summary.holdings_saved, summary.unresolved
        );
        Ok(summary)
    }
}

/// Collapse lines reporting the same security (one per manager or discretion
/// split) into a single entry with summed shares and value. Lines without a
/// CUSIP are keyed by issuer name. First-seen order is kept.
pub fn merge_by_cusip(entries: Vec<InfoTableEntry>) -> Vec<InfoTableEntry> {
    let mut merged: Vec<InfoTableEntry> = Vec::with_capacity(entries.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let key = if entry.cusip.trim().is_empty() {
            format!("name:{}", entry.name.trim().to_uppercase())
        } else {
            entry.cusip.trim().to_uppercase()
        };
        match index.get(&key) {
            Some(&i) => {
                merged[i].shares += entry.shares;
                merged[i].value += entry.value;
            }
            None => {
                index.insert(key, merged.len());
                merged.push(entry);
            }
        }
    }

    merged
}

/// Sort by value descending and keep the first `max`
pub fn keep_largest(entries: &mut Vec<InfoTableEntry>, max: usize) {
    entries.sort_by(|a, b| b.value.total_cmp(&a.value));
    entries.truncate(max);
}
