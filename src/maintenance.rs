//! Operator reports and data-quality repairs over collected holdings.

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::database::DatabaseManager;
use crate::models::{Fund, Holding};

/// Values above this are assumed to have been scaled by 1000 twice
pub const INFLATED_VALUE_THRESHOLD: f64 = 500_000_000_000.0;
/// Single positions above this are reported as suspicious
pub const SUSPICIOUS_POSITION_THRESHOLD: f64 = 200_000_000_000.0;
/// Row count past which a fund is flagged as over-collected
pub const HIGH_ROW_COUNT: i64 = 50_000;
/// A latest-period total above this means the fund's values are in the wrong unit
pub const NORMALIZATION_THRESHOLD: f64 = 1_000_000_000_000.0;

/// Thousands-vs-dollars correction applied by the repairs
const UNIT_SCALE: f64 = 1000.0;

const BAD_SYMBOL_SUFFIXES: &[&str] = &[".BA", ".SA", ".MX", ".T", ".L", ".HK", ".KS", ".TWO"];

/// Futures, FX, indices and non-US listings that 13F holdings never map to
pub fn is_bad_symbol(symbol: &str) -> bool {
    let symbol = symbol.trim().to_uppercase();
    symbol.is_empty()
        || symbol.contains('=')
        || symbol.contains('^')
        || BAD_SYMBOL_SUFFIXES.iter().any(|suffix| symbol.ends_with(suffix))
}

#[derive(Debug, Clone, PartialEq)]
pub struct FundStatus {
    pub fund: Fund,
    pub periods: usize,
    pub oldest: Option<NaiveDate>,
    pub newest: Option<NaiveDate>,
}

/// Collected periods per fund
pub async fn collection_status(db: &DatabaseManager) -> Result<Vec<FundStatus>> {
    let mut statuses = Vec::new();
    for fund in db.list_funds().await? {
        let periods = db.report_periods(fund.id).await?;
        statuses.push(FundStatus {
            periods: periods.len(),
            oldest: periods.first().copied(),
            newest: periods.last().copied(),
            fund,
        });
    }
    Ok(statuses)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FundVerification {
    pub fund: Fund,
    pub row_count: i64,
    pub oldest: Option<NaiveDate>,
    pub newest: Option<NaiveDate>,
    pub latest_total_value: f64,
    pub bad_symbol_rows: usize,
    pub oversized_positions: usize,
    pub issues: Vec<String>,
}

/// Per-fund data-quality report
pub async fn verify_funds(db: &DatabaseManager) -> Result<Vec<FundVerification>> {
    let mut reports = Vec::new();

    for fund in db.list_funds().await? {
        let row_count = db.count_holdings(fund.id).await?;
        let periods = db.report_periods(fund.id).await?;
        let newest = periods.last().copied();

        let (latest_total_value, bad_symbol_rows) = match newest {
            Some(period) => {
                let holdings = db.holdings_for_period(fund.id, period, None).await?;
                let total = db.total_value_for_period(fund.id, period).await?;
                let bad = holdings.iter().filter(|h| is_bad_symbol(&h.symbol)).count();
                (total, bad)
            }
            None => (0.0, 0),
        };
        let oversized_positions = db
            .holdings_with_value_above(SUSPICIOUS_POSITION_THRESHOLD, Some(fund.id))
            .await?
            .len();

        let mut issues = Vec::new();
        if bad_symbol_rows > 0 {
            issues.push(format!("{} holdings with bad symbols in latest period", bad_symbol_rows));
        }
        if oversized_positions > 0 {
            issues.push(format!("{} positions valued above $200B", oversized_positions));
        }
        if row_count > HIGH_ROW_COUNT {
            issues.push(format!("High row count: {}", row_count));
        }

        reports.push(FundVerification {
            fund,
            row_count,
            oldest: periods.first().copied(),
            newest,
            latest_total_value,
            bad_symbol_rows,
            oversized_positions,
            issues,
        });
    }

    Ok(reports)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnomalyReport {
    pub bad_symbols: Vec<String>,
    pub deleted_rows: u64,
    pub inflated: Vec<Holding>,
    pub dry_run: bool,
}

/// Remove bad-symbol holdings and deflate values above $500B by 1000
pub async fn clean_anomalies(db: &DatabaseManager, dry_run: bool) -> Result<AnomalyReport> {
    let mut report = AnomalyReport {
        dry_run,
        ..Default::default()
    };

    for symbol in db.distinct_holding_symbols().await? {
        if !is_bad_symbol(&symbol) {
            continue;
        }
        if dry_run {
            info!("🔍 Would delete holdings for {}", symbol);
        } else {
            let deleted = db.delete_holdings_by_symbol(&symbol).await?;
            info!("🗑️ Deleted {} holdings for {}", deleted, symbol);
            report.deleted_rows += deleted;
        }
        report.bad_symbols.push(symbol);
    }

    report.inflated = db
        .holdings_with_value_above(INFLATED_VALUE_THRESHOLD, None)
        .await?
        .into_iter()
        .filter(|h| !is_bad_symbol(&h.symbol))
        .collect();
    for holding in &report.inflated {
        let Some(id) = holding.id else {
            continue;
        };
        if dry_run {
            info!("🔍 Would scale {} {} value {:.0}", holding.symbol, holding.report_period, holding.value);
        } else {
            db.divide_holding_value(id, UNIT_SCALE).await?;
            warn!("🔧 Scaled {} {} value {:.0} down by 1000", holding.symbol, holding.report_period, holding.value);
        }
    }

    Ok(report)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FundNormalization {
    pub fund: Fund,
    pub latest_period: NaiveDate,
    pub total_before: f64,
    pub rows_scaled: u64,
}

/// Divide every value of funds whose latest total exceeds $1T by 1000
pub async fn normalize_funds(db: &DatabaseManager, dry_run: bool) -> Result<Vec<FundNormalization>> {
    let mut adjusted = Vec::new();

    for fund in db.list_funds().await? {
        let Some(latest_period) = db.latest_period(fund.id).await? else {
            continue;
        };
        let total_before = db.total_value_for_period(fund.id, latest_period).await?;
        if total_before <= NORMALIZATION_THRESHOLD {
            continue;
        }

        let rows_scaled = if dry_run {
            info!("🔍 Would normalize {} (latest total {:.0})", fund.name, total_before);
            0
        } else {
            let rows = db.divide_fund_values(fund.id, UNIT_SCALE).await?;
            info!("🔧 Normalized {} holdings of {}", rows, fund.name);
            rows
        };

        adjusted.push(FundNormalization {
            fund,
            latest_period,
            total_before,
            rows_scaled,
        });
    }

    Ok(adjusted)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopHoldings {
    pub fund: Fund,
    pub period: Option<NaiveDate>,
    pub total_value: f64,
    pub holdings: Vec<Holding>,
}

/// Largest positions of a fund in its latest period
pub async fn top_holdings(db: &DatabaseManager, fund: &Fund, limit: i64) -> Result<TopHoldings> {
    let Some(period) = db.latest_period(fund.id).await? else {
        return Ok(TopHoldings {
            fund: fund.clone(),
            period: None,
            total_value: 0.0,
            holdings: Vec::new(),
        });
    };

    Ok(TopHoldings {
        fund: fund.clone(),
        period: Some(period),
        total_value: db.total_value_for_period(fund.id, period).await?,
        holdings: db.holdings_for_period(fund.id, period, Some(limit)).await?,
    })
}
