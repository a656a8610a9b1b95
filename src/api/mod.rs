use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{RequestBuilder, Response, StatusCode};
use thiserror::Error;

use crate::models::{PriceBar, StockProfile};

pub mod fmp_client;
pub mod retry;
pub mod sec_edgar_client;
pub mod yahoo_client;

pub use fmp_client::{FmpClient, FmpDcf, FmpInsiderTrade, FmpRatiosTtm};
pub use retry::RetryPolicy;
pub use sec_edgar_client::{SecEdgarClient, Submissions};
pub use yahoo_client::YahooClient;

/// Errors raised at the HTTP client seam
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("rate limited (429) by {url}")]
    RateLimited { url: String },
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    /// Rate limits and transport failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. } | ApiError::Transport { .. })
    }

    pub(crate) fn decode(url: &str, err: impl std::fmt::Display) -> Self {
        ApiError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Send a request, mapping transport failures and 429s to `ApiError`
pub(crate) async fn send(request: RequestBuilder, url: &str) -> Result<Response, ApiError> {
    let response = request.send().await.map_err(|source| ApiError::Transport {
        url: url.to_string(),
        source,
    })?;

    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        return Err(ApiError::RateLimited { url: url.to_string() });
    }

    Ok(response)
}

/// Like `send`, but any non-success status is an error
pub(crate) async fn send_ok(request: RequestBuilder, url: &str) -> Result<Response, ApiError> {
    let response = send(request, url).await?;
    if !response.status().is_success() {
        return Err(ApiError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(response)
}

/// Filings registry (submissions metadata and archive documents)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FilingSource: Send + Sync {
    async fn get_submissions(&self, cik: &str) -> Result<Submissions, ApiError>;

    /// Fetch a document body; `None` when the registry has no such document
    async fn fetch_text(&self, url: &str) -> Result<Option<String>, ApiError>;
}

/// Name to ticker search
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SymbolSearch: Send + Sync {
    async fn search_symbol(&self, query: &str) -> Result<Option<String>, ApiError>;
}

/// Historical and spot prices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, ApiError>;

    async fn latest_price(&self, symbol: &str) -> Result<Option<f64>, ApiError>;
}

/// Company fundamentals, insider feed and ETF constituents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    async fn insider_feed(&self, page: u32) -> Result<Vec<FmpInsiderTrade>, ApiError>;

    async fn etf_holders(&self, symbol: &str) -> Result<Vec<serde_json::Value>, ApiError>;

    async fn company_profile(&self, symbol: &str) -> Result<Option<StockProfile>, ApiError>;

    /// Symbols of the current S&P 500 members
    async fn sp500_constituents(&self) -> Result<Vec<String>, ApiError>;

    async fn ratios_ttm(&self, symbol: &str) -> Result<Option<FmpRatiosTtm>, ApiError>;

    async fn discounted_cash_flow(&self, symbol: &str) -> Result<Option<FmpDcf>, ApiError>;
}
