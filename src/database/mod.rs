use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::models::{
    EtfHolding, Fund, FundSeed, Holding, InsiderTrade, Stock, StockProfile, ValuationMetrics, PLACEHOLDER_SECTOR,
};

/// SQLx-backed store for funds, holdings, stocks, insider trades and ETF snapshots
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open (or create) the database and make sure the schema exists
    pub async fn new(database_url: &str) -> Result<Self> {
        let connection_string = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite:{}", database_url)
        };
        let in_memory = connection_string.contains(":memory:");

        debug!("Connecting to database: {}", connection_string);

        let mut options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to :memory: is a separate database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        info!("Database initialized at {}", connection_string);

        Ok(db)
    }

    /// Private in-memory database, used by tests and dry experiments
    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Create tables and indexes if they do not exist yet
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hedge_funds (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                strategy TEXT,
                description TEXT,
                cik TEXT UNIQUE NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stocks (
                symbol TEXT PRIMARY KEY,
                name TEXT,
                sector TEXT,
                industry TEXT,
                market_cap REAL,
                price REAL,
                changes_percentage REAL,
                valuation_metrics TEXT,
                updated_at DATETIME
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Databases created before valuation data was collected lack these columns
        self.ensure_column("stocks", "changes_percentage", "REAL").await?;
        self.ensure_column("stocks", "valuation_metrics", "TEXT").await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fund_holdings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fund_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                report_period DATE NOT NULL,
                shares REAL NOT NULL DEFAULT 0,
                value REAL NOT NULL DEFAULT 0,
                avg_buy_price REAL NOT NULL DEFAULT 0,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (fund_id) REFERENCES hedge_funds(id),
                FOREIGN KEY (symbol) REFERENCES stocks(symbol),
                UNIQUE(fund_id, symbol, report_period)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS insider_trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                transaction_date DATE NOT NULL,
                reporting_date DATE,
                company TEXT,
                insider_name TEXT NOT NULL,
                transaction_type TEXT,
                securities_transacted REAL NOT NULL,
                price REAL,
                securities_owned REAL,
                filing_url TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(symbol, transaction_date, insider_name, securities_transacted)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS etf_holdings (
                symbol TEXT PRIMARY KEY,
                holdings TEXT NOT NULL,
                last_updated DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_fund_holdings_fund_period ON fund_holdings(fund_id, report_period)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_fund_holdings_symbol ON fund_holdings(symbol)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_insider_trades_symbol ON insider_trades(symbol)")
            .execute(&self.pool)
            .await?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    async fn ensure_column(&self, table: &str, column: &str, declaration: &str) -> Result<()> {
        let columns = sqlx::query(&format!("PRAGMA table_info({})", table))
            .fetch_all(&self.pool)
            .await?;
        if columns.iter().any(|row| row.get::<String, _>("name") == column) {
            return Ok(());
        }

        info!("Adding column {}.{}", table, column);
        sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, declaration))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- funds ----

    pub async fn get_fund_by_cik(&self, cik: &str) -> Result<Option<Fund>> {
        let row = sqlx::query("SELECT id, name, strategy, description, cik FROM hedge_funds WHERE cik = ?")
            .bind(cik)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(fund_from_row))
    }

    /// Insert the fund unless its CIK is already known. Existing rows are never
    /// rewritten. Returns the stored fund and whether it was created.
    pub async fn get_or_create_fund(&self, seed: &FundSeed) -> Result<(Fund, bool)> {
        let result = sqlx::query(
            r#"
            INSERT INTO hedge_funds (name, strategy, description, cik)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(cik) DO NOTHING
            "#,
        )
        .bind(seed.name)
        .bind(seed.strategy)
        .bind(seed.description)
        .bind(seed.cik)
        .execute(&self.pool)
        .await?;

        let fund = self
            .get_fund_by_cik(seed.cik)
            .await?
            .ok_or_else(|| anyhow!("fund with CIK {} missing after insert", seed.cik))?;

        Ok((fund, result.rows_affected() == 1))
    }

    pub async fn list_funds(&self) -> Result<Vec<Fund>> {
        let rows = sqlx::query("SELECT id, name, strategy, description, cik FROM hedge_funds ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(fund_from_row).collect())
    }

    // ---- stocks ----

    pub async fn get_stock(&self, symbol: &str) -> Result<Option<Stock>> {
        let row = sqlx::query(
            r#"
            SELECT symbol, name, sector, industry, market_cap, price, changes_percentage,
                   valuation_metrics, updated_at
            FROM stocks WHERE symbol = ?
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let valuation_metrics = row
            .get::<Option<String>, _>("valuation_metrics")
            .map(|raw| serde_json::from_str::<ValuationMetrics>(&raw))
            .transpose()?;

        Ok(Some(Stock {
            symbol: row.get("symbol"),
            name: row.get("name"),
            sector: row.get("sector"),
            industry: row.get("industry"),
            market_cap: row.get("market_cap"),
            price: row.get("price"),
            changes_percentage: row.get("changes_percentage"),
            valuation_metrics,
            updated_at: row.get::<Option<DateTime<Utc>>, _>("updated_at"),
        }))
    }

    /// Insert or refresh a full stock row from a profile and valuation snapshot.
    /// Unlike the placeholder insert, this overwrites an existing row; fields
    /// the profile leaves empty keep their stored value.
    pub async fn upsert_stock_data(
        &self,
        symbol: &str,
        profile: &StockProfile,
        metrics: &ValuationMetrics,
    ) -> Result<()> {
        let metrics_json = serde_json::to_string(metrics)?;

        sqlx::query(
            r#"
            INSERT INTO stocks (symbol, name, sector, industry, market_cap, price, changes_percentage,
                                valuation_metrics, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol) DO UPDATE SET
                name = COALESCE(excluded.name, stocks.name),
                sector = COALESCE(excluded.sector, stocks.sector),
                industry = COALESCE(excluded.industry, stocks.industry),
                market_cap = COALESCE(excluded.market_cap, stocks.market_cap),
                price = COALESCE(excluded.price, stocks.price),
                changes_percentage = COALESCE(excluded.changes_percentage, stocks.changes_percentage),
                valuation_metrics = excluded.valuation_metrics,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(symbol)
        .bind(&profile.name)
        .bind(&profile.sector)
        .bind(&profile.industry)
        .bind(profile.market_cap)
        .bind(profile.price)
        .bind(profile.changes_percentage)
        .bind(metrics_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_stocks_with_valuation(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM stocks WHERE valuation_metrics IS NOT NULL")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("count"))
    }

    /// Symbols of stock rows that were only created to satisfy the holdings foreign key
    pub async fn placeholder_stocks(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT symbol FROM stocks WHERE sector IS NULL OR sector = ? ORDER BY symbol")
            .bind(PLACEHOLDER_SECTOR)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("symbol")).collect())
    }

    /// Overwrite descriptive fields with whatever the profile provides
    pub async fn update_stock_profile(&self, symbol: &str, profile: &StockProfile) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE stocks SET
                name = COALESCE(?, name),
                sector = COALESCE(?, sector),
                industry = COALESCE(?, industry),
                market_cap = COALESCE(?, market_cap),
                price = COALESCE(?, price),
                changes_percentage = COALESCE(?, changes_percentage),
                updated_at = ?
            WHERE symbol = ?
            "#,
        )
        .bind(&profile.name)
        .bind(&profile.sector)
        .bind(&profile.industry)
        .bind(profile.market_cap)
        .bind(profile.price)
        .bind(profile.changes_percentage)
        .bind(Utc::now())
        .bind(symbol)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // ---- holdings ----

    /// Upsert one holding keyed by (fund, symbol, period). A placeholder stock
    /// row is created first when the symbol is unknown; both writes share one
    /// transaction.
    pub async fn upsert_holding(&self, holding: &Holding) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO stocks (symbol, name, sector)
            VALUES (?, ?, ?)
            ON CONFLICT(symbol) DO NOTHING
            "#,
        )
        .bind(&holding.symbol)
        .bind(&holding.symbol)
        .bind(PLACEHOLDER_SECTOR)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO fund_holdings (fund_id, symbol, report_period, shares, value, avg_buy_price)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(fund_id, symbol, report_period) DO UPDATE SET
                shares = excluded.shares,
                value = excluded.value,
                avg_buy_price = excluded.avg_buy_price,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(holding.fund_id)
        .bind(&holding.symbol)
        .bind(holding.report_period)
        .bind(holding.shares)
        .bind(holding.value)
        .bind(holding.avg_buy_price)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn count_holdings_for_period(&self, fund_id: i64, period: NaiveDate) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM fund_holdings WHERE fund_id = ? AND report_period = ?")
            .bind(fund_id)
            .bind(period)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("count"))
    }

    pub async fn count_holdings(&self, fund_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM fund_holdings WHERE fund_id = ?")
            .bind(fund_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("count"))
    }

    /// Distinct collected periods of a fund, oldest first
    pub async fn report_periods(&self, fund_id: i64) -> Result<Vec<NaiveDate>> {
        let rows = sqlx::query(
            "SELECT DISTINCT report_period FROM fund_holdings WHERE fund_id = ? ORDER BY report_period",
        )
        .bind(fund_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("report_period")).collect())
    }

    pub async fn latest_period(&self, fund_id: i64) -> Result<Option<NaiveDate>> {
        let row = sqlx::query(
            "SELECT report_period FROM fund_holdings WHERE fund_id = ? ORDER BY report_period DESC LIMIT 1",
        )
        .bind(fund_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("report_period")))
    }

    /// Holdings of one fund and period, largest value first
    pub async fn holdings_for_period(
        &self,
        fund_id: i64,
        period: NaiveDate,
        limit: Option<i64>,
    ) -> Result<Vec<Holding>> {
        let rows = sqlx::query(
            r#"
            SELECT id, fund_id, symbol, report_period, shares, value, avg_buy_price
            FROM fund_holdings
            WHERE fund_id = ? AND report_period = ?
            ORDER BY value DESC
            LIMIT ?
            "#,
        )
        .bind(fund_id)
        .bind(period)
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(holding_from_row).collect())
    }

    pub async fn total_value_for_period(&self, fund_id: i64, period: NaiveDate) -> Result<f64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(value), 0.0) AS total FROM fund_holdings WHERE fund_id = ? AND report_period = ?",
        )
        .bind(fund_id)
        .bind(period)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }

    pub async fn distinct_holding_symbols(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT symbol FROM fund_holdings ORDER BY symbol")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("symbol")).collect())
    }

    /// Holdings whose value exceeds `threshold`, optionally restricted to one fund
    pub async fn holdings_with_value_above(&self, threshold: f64, fund_id: Option<i64>) -> Result<Vec<Holding>> {
        let rows = sqlx::query(
            r#"
            SELECT id, fund_id, symbol, report_period, shares, value, avg_buy_price
            FROM fund_holdings
            WHERE value > ? AND (? IS NULL OR fund_id = ?)
            ORDER BY value DESC
            "#,
        )
        .bind(threshold)
        .bind(fund_id)
        .bind(fund_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(holding_from_row).collect())
    }

    pub async fn delete_holdings_by_symbol(&self, symbol: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM fund_holdings WHERE symbol = ?")
            .bind(symbol)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn divide_holding_value(&self, holding_id: i64, divisor: f64) -> Result<()> {
        sqlx::query("UPDATE fund_holdings SET value = value / ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(divisor)
            .bind(holding_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Divide every holding value of a fund, across all periods
    pub async fn divide_fund_values(&self, fund_id: i64, divisor: f64) -> Result<u64> {
        let result =
            sqlx::query("UPDATE fund_holdings SET value = value / ?, updated_at = CURRENT_TIMESTAMP WHERE fund_id = ?")
                .bind(divisor)
                .bind(fund_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    // ---- insider trades ----

    /// Insert a trade unless its natural key is already stored. Returns true for new rows.
    pub async fn insert_insider_trade(&self, trade: &InsiderTrade) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO insider_trades (
                symbol, transaction_date, reporting_date, company, insider_name,
                transaction_type, securities_transacted, price, securities_owned, filing_url
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&trade.symbol)
        .bind(trade.transaction_date)
        .bind(trade.reporting_date)
        .bind(&trade.company)
        .bind(&trade.insider_name)
        .bind(&trade.transaction_type)
        .bind(trade.securities_transacted)
        .bind(trade.price)
        .bind(trade.securities_owned)
        .bind(&trade.filing_url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn count_insider_trades(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM insider_trades")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("count"))
    }

    // ---- ETF holdings ----

    pub async fn upsert_etf_holdings(&self, etf: &EtfHolding) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO etf_holdings (symbol, holdings, last_updated)
            VALUES (?, ?, ?)
            ON CONFLICT(symbol) DO UPDATE SET
                holdings = excluded.holdings,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&etf.symbol)
        .bind(serde_json::to_string(&etf.holdings)?)
        .bind(etf.last_updated)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_etf_holdings(&self, symbol: &str) -> Result<Option<EtfHolding>> {
        let row = sqlx::query("SELECT symbol, holdings, last_updated FROM etf_holdings WHERE symbol = ?")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.get("holdings");
        Ok(Some(EtfHolding {
            symbol: row.get("symbol"),
            holdings: serde_json::from_str(&raw)?,
            last_updated: row.get("last_updated"),
        }))
    }
}

fn fund_from_row(row: &SqliteRow) -> Fund {
    Fund {
        id: row.get("id"),
        name: row.get("name"),
        strategy: row.get("strategy"),
        description: row.get("description"),
        cik: row.get("cik"),
    }
}

fn holding_from_row(row: &SqliteRow) -> Holding {
    Holding {
        id: Some(row.get("id")),
        fund_id: row.get("fund_id"),
        symbol: row.get("symbol"),
        report_period: row.get("report_period"),
        shares: row.get("shares"),
        value: row.get("value"),
        avg_buy_price: row.get("avg_buy_price"),
    }
}
