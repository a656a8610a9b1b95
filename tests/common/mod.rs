//! Common test utilities and helpers

pub mod api_mock;
pub mod database;

/// Test data utilities
pub mod test_data {
    use chrono::NaiveDate;
    use holdings_tracker::models::{FundSeed, Holding, DEFAULT_FUNDS};

    pub fn period(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Berkshire Hathaway, the first default fund
    pub fn create_test_fund_seed() -> FundSeed {
        DEFAULT_FUNDS[0]
    }

    /// A holding of `value` dollars at $100 a share
    pub fn create_test_holding(fund_id: i64, symbol: &str, report_period: NaiveDate, value: f64) -> Holding {
        Holding {
            id: None,
            fund_id,
            symbol: symbol.to_string(),
            report_period,
            shares: value / 100.0,
            value,
            avg_buy_price: 100.0,
        }
    }
}

/// Logging utilities for tests
pub mod logging {
    use std::sync::Once;
    use tracing::{debug, info};

    static INIT: Once = Once::new();

    /// Initialize test logging
    pub fn init_test_logging() {
        INIT.call_once(|| {
            // test-log may already have installed a subscriber
            let _ = tracing::subscriber::set_global_default(
                tracing_subscriber::fmt()
                    .with_env_filter("holdings_tracker=debug,main=debug")
                    .with_test_writer()
                    .finish(),
            );
        });
    }

    /// Log test step
    pub fn log_test_step(step: &str) {
        info!("🧪 Test Step: {}", step);
    }

    /// Log test data
    pub fn log_test_data<T: std::fmt::Debug>(label: &str, data: &T) {
        debug!("📊 {}: {:?}", label, data);
    }
}
