//! 13F-HR ingestion pipeline: locate the information table of each filing,
//! parse it, resolve issuers to tickers and estimate a reference price.

pub mod locator;
pub mod parser;
pub mod price;
pub mod resolver;

pub use locator::{CollectionMode, FilingLocator};
pub use parser::{fetch_info_table, parse_info_table, value_multiplier_for};
pub use price::PriceEstimator;
pub use resolver::TickerResolver;

/// Form type of the quarterly holdings report
pub const FORM_13F_HR: &str = "13F-HR";
