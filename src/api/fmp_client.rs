use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{send_ok, ApiError, FundamentalsProvider, RetryPolicy};
use crate::models::{Config, StockProfile};

/// Insider trade as returned by the FMP feed
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FmpInsiderTrade {
    pub symbol: Option<String>,
    pub filing_date: Option<String>,
    pub transaction_date: Option<String>,
    pub transaction_type: Option<String>,
    pub securities_transacted: Option<f64>,
    pub price: Option<f64>,
    pub securities_owned: Option<f64>,
    pub company: Option<String>,
    pub reporting_name: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpProfile {
    company_name: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
    mkt_cap: Option<f64>,
    price: Option<f64>,
    changes: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FmpConstituent {
    symbol: Option<String>,
}

/// Trailing-twelve-month ratios. FMP spells the yield field `dividendYielTTM`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FmpRatiosTtm {
    #[serde(rename = "peRatioTTM")]
    pub pe_ratio: Option<f64>,
    #[serde(rename = "priceToBookRatioTTM")]
    pub price_to_book: Option<f64>,
    #[serde(rename = "dividendYielTTM")]
    pub dividend_yield: Option<f64>,
    #[serde(rename = "dividendYielPercentageTTM")]
    pub dividend_yield_percentage: Option<f64>,
    #[serde(rename = "dividendPerShareTTM")]
    pub dividend_per_share: Option<f64>,
    #[serde(rename = "enterpriseValueMultipleTTM")]
    pub enterprise_value_multiple: Option<f64>,
}

/// Discounted cash flow estimate next to the quoted price
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FmpDcf {
    pub dcf: Option<f64>,
    #[serde(rename = "Stock Price")]
    pub stock_price: Option<f64>,
}

/// Financial Modeling Prep client
pub struct FmpClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl FmpClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.require_fmp_key()?.to_string();
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("holdings-tracker/1.0")
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.fmp_base_url.trim_end_matches('/').to_string(),
            api_key,
            retry: RetryPolicy::linear(3, Duration::from_secs(config.retry_backoff_secs)),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn get_json<T>(&self, label: &str, path: &str, query: &[(&str, String)]) -> Result<T, ApiError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let url = format!("{}{}", self.base_url, path);
        let url = url.as_str();
        let api_key = self.api_key.as_str();

        self.retry
            .run(label, || async move {
                let request = self
                    .http_client
                    .get(url)
                    .query(query)
                    .query(&[("apikey", api_key)]);
                let response = send_ok(request, url).await?;
                response.json::<T>().await.map_err(|e| ApiError::decode(url, e))
            })
            .await
    }
}

#[async_trait]
impl FundamentalsProvider for FmpClient {
    async fn insider_feed(&self, page: u32) -> Result<Vec<FmpInsiderTrade>, ApiError> {
        self.get_json(
            "FMP insider feed",
            "/v4/insider-trading-rss-feed",
            &[("page", page.to_string())],
        )
        .await
    }

    async fn etf_holders(&self, symbol: &str) -> Result<Vec<serde_json::Value>, ApiError> {
        self.get_json("FMP ETF holders", &format!("/v3/etf-holder/{}", symbol), &[])
            .await
    }

    async fn company_profile(&self, symbol: &str) -> Result<Option<StockProfile>, ApiError> {
        let profiles: Vec<FmpProfile> = self
            .get_json("FMP profile", &format!("/v3/profile/{}", symbol), &[])
            .await?;

        Ok(profiles.into_iter().next().map(|p| StockProfile {
            name: p.company_name,
            sector: p.sector.filter(|s| !s.trim().is_empty()),
            industry: p.industry.filter(|s| !s.trim().is_empty()),
            market_cap: p.mkt_cap,
            price: p.price,
            changes_percentage: p.changes,
        }))
    }

    async fn sp500_constituents(&self) -> Result<Vec<String>, ApiError> {
        let constituents: Vec<FmpConstituent> = self
            .get_json("FMP S&P 500 constituents", "/v3/sp500_constituent", &[])
            .await?;

        Ok(constituents
            .into_iter()
            .filter_map(|c| c.symbol)
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect())
    }

    async fn ratios_ttm(&self, symbol: &str) -> Result<Option<FmpRatiosTtm>, ApiError> {
        let ratios: Vec<FmpRatiosTtm> = self
            .get_json("FMP ratios TTM", &format!("/v3/ratios-ttm/{}", symbol), &[])
            .await?;
        Ok(ratios.into_iter().next())
    }

    async fn discounted_cash_flow(&self, symbol: &str) -> Result<Option<FmpDcf>, ApiError> {
        let dcf: Vec<FmpDcf> = self
            .get_json("FMP DCF", &format!("/v3/discounted-cash-flow/{}", symbol), &[])
            .await?;
        Ok(dcf.into_iter().next())
    }
}
