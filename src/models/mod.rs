use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Institutional manager that files 13F reports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fund {
    pub id: i64,
    pub name: String,
    pub strategy: Option<String>,
    pub description: Option<String>,
    pub cik: String,
}

/// Seed entry used to create a fund the first time it is seen
#[derive(Debug, Clone, Copy)]
pub struct FundSeed {
    pub name: &'static str,
    pub cik: &'static str,
    pub strategy: &'static str,
    pub description: &'static str,
}

/// Funds tracked by default
pub const DEFAULT_FUNDS: &[FundSeed] = &[
    FundSeed {
        name: "Berkshire Hathaway",
        cik: "0001067983",
        strategy: "Value Investing",
        description: "Warren Buffett's holding company",
    },
    FundSeed {
        name: "Bridgewater Associates",
        cik: "0001350694",
        strategy: "Global Macro",
        description: "Ray Dalio's firm, one of the world's largest hedge funds",
    },
    FundSeed {
        name: "Renaissance Technologies",
        cik: "0001037389",
        strategy: "Quantitative",
        description: "Jim Simons' quantitative trading firm",
    },
    FundSeed {
        name: "Bill & Melinda Gates Foundation",
        cik: "0001166559",
        strategy: "Endowment",
        description: "One of the largest charitable foundations",
    },
    FundSeed {
        name: "Pershing Square Capital",
        cik: "0001336528",
        strategy: "Activist",
        description: "Bill Ackman's activist hedge fund",
    },
    FundSeed {
        name: "Third Point",
        cik: "0001040273",
        strategy: "Event Driven",
        description: "Daniel Loeb's event-driven firm",
    },
    FundSeed {
        name: "Citadel Advisors",
        cik: "0001423053",
        strategy: "Multi-Strategy",
        description: "Ken Griffin's multi-strategy hedge fund",
    },
];

/// Stock metadata, possibly a placeholder created during holding ingestion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stock {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub price: Option<f64>,
    pub changes_percentage: Option<f64>,
    pub valuation_metrics: Option<ValuationMetrics>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Valuation snapshot kept as JSON on the stock row. Ratio fields are
/// trailing twelve months; `dividend_yield_pct` is a percentage (3.1 = 3.1%).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValuationMetrics {
    pub dcf: Option<f64>,
    pub stock_price: Option<f64>,
    pub pe_ratio_ttm: Option<f64>,
    pub pb_ratio_ttm: Option<f64>,
    pub div_yield_ttm: Option<f64>,
    pub dividend_yield_pct: Option<f64>,
    pub dps_ttm: Option<f64>,
    pub ev_ebitda_ttm: Option<f64>,
}

/// Sector recorded on stock rows created only to satisfy the holdings foreign key
pub const PLACEHOLDER_SECTOR: &str = "Unknown";

/// One position of a fund in a reporting period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holding {
    pub id: Option<i64>,
    pub fund_id: i64,
    pub symbol: String,
    pub report_period: NaiveDate,
    pub shares: f64,
    pub value: f64,
    pub avg_buy_price: f64,
}

/// Raw row of a 13F information table
#[derive(Debug, Clone, PartialEq)]
pub struct InfoTableEntry {
    pub name: String,
    pub cusip: String,
    pub value: f64,
    pub shares: f64,
}

/// A located information-table document for one filing
#[derive(Debug, Clone, PartialEq)]
pub struct FilingDocument {
    pub accession_number: String,
    pub report_period: NaiveDate,
    pub url: String,
}

/// Daily bar from the market-data provider
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
}

/// Insider transaction as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsiderTrade {
    pub symbol: String,
    pub transaction_date: NaiveDate,
    pub reporting_date: Option<NaiveDate>,
    pub company: String,
    pub insider_name: String,
    pub transaction_type: Option<String>,
    pub securities_transacted: f64,
    pub price: Option<f64>,
    pub securities_owned: Option<f64>,
    pub filing_url: Option<String>,
}

/// ETF constituents snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtfHolding {
    pub symbol: String,
    pub holdings: serde_json::Value,
    pub last_updated: DateTime<Utc>,
}

/// Company profile fields from the fundamentals provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockProfile {
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub price: Option<f64>,
    pub changes_percentage: Option<f64>,
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub fmp_api_key: Option<String>,
    pub sec_user_agent: String,
    pub sec_data_url: String,
    pub sec_archive_url: String,
    pub yahoo_search_url: String,
    pub yahoo_chart_url: String,
    pub fmp_base_url: String,
    pub max_holdings_per_filing: usize,
    pub skip_threshold: i64,
    pub retry_attempts: u32,
    pub retry_backoff_secs: u64,
    pub filing_delay_secs: u64,
    pub sec_requests_per_second: u32,
    pub etf_symbols: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite:holdings.db".to_string(),
            fmp_api_key: None,
            sec_user_agent: "holdings-tracker/1.0 (contact@example.com)".to_string(),
            sec_data_url: "https://data.sec.gov".to_string(),
            sec_archive_url: "https://www.sec.gov".to_string(),
            yahoo_search_url: "https://query2.finance.yahoo.com/v1/finance/search".to_string(),
            yahoo_chart_url: "https://query2.finance.yahoo.com/v8/finance/chart".to_string(),
            fmp_base_url: "https://financialmodelingprep.com/api".to_string(),
            max_holdings_per_filing: 100,
            skip_threshold: 5,
            retry_attempts: 5,
            retry_backoff_secs: 2,
            filing_delay_secs: 2,
            sec_requests_per_second: 10,
            etf_symbols: ["SPY", "QQQ", "DIA", "SCHD"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Config::default();

        Ok(Config {
            database_url: env_or("DATABASE_URL", defaults.database_url),
            fmp_api_key: std::env::var("FMP_API_KEY").ok().filter(|key| !key.trim().is_empty()),
            sec_user_agent: env_or("SEC_USER_AGENT", defaults.sec_user_agent),
            sec_data_url: env_or("SEC_DATA_URL", defaults.sec_data_url),
            sec_archive_url: env_or("SEC_ARCHIVE_URL", defaults.sec_archive_url),
            yahoo_search_url: env_or("YAHOO_SEARCH_URL", defaults.yahoo_search_url),
            yahoo_chart_url: env_or("YAHOO_CHART_URL", defaults.yahoo_chart_url),
            fmp_base_url: env_or("FMP_BASE_URL", defaults.fmp_base_url),
            max_holdings_per_filing: env_parse("MAX_HOLDINGS_PER_FILING", defaults.max_holdings_per_filing),
            skip_threshold: env_parse("SKIP_THRESHOLD", defaults.skip_threshold),
            retry_attempts: env_parse("RETRY_ATTEMPTS", defaults.retry_attempts),
            retry_backoff_secs: env_parse("RETRY_BACKOFF_SECS", defaults.retry_backoff_secs),
            filing_delay_secs: env_parse("FILING_DELAY_SECS", defaults.filing_delay_secs),
            sec_requests_per_second: env_parse("SEC_REQUESTS_PER_SECOND", defaults.sec_requests_per_second),
            etf_symbols: std::env::var("ETF_SYMBOLS")
                .map(|raw| parse_symbol_list(&raw))
                .ok()
                .filter(|symbols| !symbols.is_empty())
                .unwrap_or(defaults.etf_symbols),
        })
    }

    /// FMP key, required by the fundamentals-backed commands
    pub fn require_fmp_key(&self) -> anyhow::Result<&str> {
        self.fmp_api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("FMP_API_KEY environment variable required"))
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty()).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Split a comma separated symbol list, upper-casing and dropping blanks
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
