use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use holdings_tracker::api::FmpClient;
use holdings_tracker::data_collector::ThirteenFCollector;
use holdings_tracker::database::DatabaseManager;
use holdings_tracker::fundamentals::{EtfCollector, InsiderCollector, StockEnricher, StockUniverseCollector};
use holdings_tracker::maintenance;
use holdings_tracker::models::{parse_symbol_list, Config, Fund, DEFAULT_FUNDS};
use holdings_tracker::thirteen_f::CollectionMode;
use holdings_tracker::utils::{format_money, select_fund};

#[derive(Parser)]
#[command(name = "holdings-tracker")]
#[command(about = "Collect 13F holdings, insider trades, ETF compositions and stock valuations into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the default fund list (existing funds are left untouched)
    Seed,
    /// Collect 13F-HR holdings
    Collect {
        /// Walk every 13F-HR in the recent filing list instead of just the latest
        #[arg(long)]
        historical: bool,
        /// Only this fund (CIK or name)
        #[arg(long)]
        fund: Option<String>,
    },
    /// Store the latest insider trades
    Insiders {
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    /// Refresh ETF constituent snapshots
    Etfs {
        /// Comma separated ETF symbols, defaults to ETF_SYMBOLS
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Refresh profile and valuation metrics for S&P 500 members
    Stocks {
        /// Only the first N constituents
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Fill placeholder stocks with company profiles
    Enrich,
    /// Collected periods per fund
    Status,
    /// Data-quality report per fund
    Verify,
    /// Delete bad-symbol holdings and deflate inflated values
    CleanAnomalies {
        #[arg(long)]
        dry_run: bool,
    },
    /// Rescale funds whose latest total is implausibly large
    Normalize {
        #[arg(long)]
        dry_run: bool,
    },
    /// Largest positions of a fund in its latest period
    Top {
        /// Fund CIK or name
        #[arg(long)]
        fund: String,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("holdings_tracker=info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let database = DatabaseManager::new(&config.database_url).await?;

    if let Err(e) = run(cli.command, &config, database).await {
        error!("❌ {}", e);
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Command, config: &Config, database: DatabaseManager) -> Result<()> {
    match command {
        Command::Seed => {
            let created = seed_funds(&database).await?;
            println!("✅ Seeded {} new funds ({} configured)", created, DEFAULT_FUNDS.len());
        }
        Command::Collect { historical, fund } => {
            let mode = if historical {
                CollectionMode::Historical
            } else {
                CollectionMode::Latest
            };
            seed_funds(&database).await?;
            let funds = match fund {
                Some(query) => vec![find_fund(&database, &query).await?],
                None => database.list_funds().await?,
            };

            let mut collector = ThirteenFCollector::from_config(config, database)?;
            let summary = collector.run_all(&funds, mode).await;
            println!("\n📊 COLLECTION SUMMARY");
            println!("   Filings found:     {}", summary.filings_seen);
            println!("   Periods processed: {}", summary.periods_processed);
            println!("   Periods skipped:   {}", summary.periods_skipped);
            println!("   Empty documents:   {}", summary.empty_documents);
            println!("   Holdings saved:    {}", summary.holdings_saved);
            println!("   Unresolved names:  {}", summary.unresolved);
            println!("   Failed writes:     {}", summary.failed_writes);
        }
        Command::Insiders { page } => {
            let provider = Arc::new(FmpClient::new(config)?);
            let summary = InsiderCollector::new(database.clone(), provider).collect_page(page).await?;
            println!(
                "✅ {} new insider trades ({} fetched, {} invalid, {} stored in total)",
                summary.inserted,
                summary.fetched,
                summary.invalid,
                database.count_insider_trades().await?
            );
        }
        Command::Etfs { symbols } => {
            let symbols = symbols
                .map(|raw| parse_symbol_list(&raw))
                .unwrap_or_else(|| config.etf_symbols.clone());
            let provider = Arc::new(FmpClient::new(config)?);
            let summary = EtfCollector::new(database, provider).collect(&symbols).await;
            println!(
                "✅ Updated {} ETFs ({} empty, {} failed)",
                summary.updated, summary.empty, summary.failed
            );
        }
        Command::Stocks { limit } => {
            let provider = Arc::new(FmpClient::new(config)?);
            let summary = StockUniverseCollector::new(database.clone(), provider).collect(limit).await?;
            println!(
                "✅ Updated {} of {} stocks ({} without profile, {} failed, {} with valuation data)",
                summary.updated,
                summary.constituents,
                summary.missing,
                summary.failed,
                database.count_stocks_with_valuation().await?
            );
        }
        Command::Enrich => {
            let provider = Arc::new(FmpClient::new(config)?);
            let summary = StockEnricher::new(database, provider).enrich_placeholders().await?;
            println!(
                "✅ Enriched {} of {} placeholder stocks ({} without profile, {} failed)",
                summary.updated, summary.candidates, summary.missing, summary.failed
            );
        }
        Command::Status => {
            println!("📋 COLLECTION STATUS");
            for status in maintenance::collection_status(&database).await? {
                match (status.oldest, status.newest) {
                    (Some(oldest), Some(newest)) => println!(
                        "   {:<35} {:>3} periods  {} → {}",
                        status.fund.name, status.periods, oldest, newest
                    ),
                    _ => println!("   {:<35} no data", status.fund.name),
                }
            }
        }
        Command::Verify => {
            println!("🔍 VERIFICATION REPORT");
            for report in maintenance::verify_funds(&database).await? {
                println!("\n{} (CIK {})", report.fund.name, report.fund.cik);
                println!("   Rows: {}", report.row_count);
                if let (Some(oldest), Some(newest)) = (report.oldest, report.newest) {
                    println!("   Periods: {} → {}", oldest, newest);
                }
                println!("   Latest period value: {}", format_money(report.latest_total_value));
                if report.issues.is_empty() {
                    println!("   ✅ No issues");
                }
                for issue in &report.issues {
                    println!("   ⚠️ {}", issue);
                }
            }
        }
        Command::CleanAnomalies { dry_run } => {
            let report = maintenance::clean_anomalies(&database, dry_run).await?;
            let verb = if dry_run { "Would delete" } else { "Deleted" };
            println!(
                "🧹 {} holdings for {} bad symbols ({} rows)",
                verb,
                report.bad_symbols.len(),
                report.deleted_rows
            );
            for holding in &report.inflated {
                println!(
                    "   {} {} {} → {}",
                    holding.symbol,
                    holding.report_period,
                    format_money(holding.value),
                    format_money(holding.value / 1000.0)
                );
            }
        }
        Command::Normalize { dry_run } => {
            let adjusted = maintenance::normalize_funds(&database, dry_run).await?;
            if adjusted.is_empty() {
                println!("✅ All funds within range");
            }
            for fund in &adjusted {
                println!(
                    "🔧 {}: latest total {} ({}), {} rows scaled",
                    fund.fund.name,
                    format_money(fund.total_before),
                    fund.latest_period,
                    fund.rows_scaled
                );
            }
        }
        Command::Top { fund, limit } => {
            let fund = find_fund(&database, &fund).await?;
            let top = maintenance::top_holdings(&database, &fund, limit).await?;
            let Some(period) = top.period else {
                println!("No holdings collected for {}", fund.name);
                return Ok(());
            };
            println!("🏆 {} as of {} (total {})", fund.name, period, format_money(top.total_value));
            for (i, holding) in top.holdings.iter().enumerate() {
                println!(
                    "   {:>2}. {:<8} {:>12}  {:>14.0} shares  avg ${:.2}",
                    i + 1,
                    holding.symbol,
                    format_money(holding.value),
                    holding.shares,
                    holding.avg_buy_price
                );
            }
        }
    }

    Ok(())
}

/// Create any missing default funds, returning how many were new
async fn seed_funds(database: &DatabaseManager) -> Result<usize> {
    let mut created = 0;
    for seed in DEFAULT_FUNDS {
        let (fund, is_new) = database.get_or_create_fund(seed).await?;
        if is_new {
            info!("➕ Added fund {} (CIK {})", fund.name, fund.cik);
            created += 1;
        }
    }
    Ok(created)
}

async fn find_fund(database: &DatabaseManager, query: &str) -> Result<Fund> {
    let funds = database.list_funds().await?;
    select_fund(&funds, query)
        .cloned()
        .ok_or_else(|| anyhow!("No fund matches '{}'", query))
}
