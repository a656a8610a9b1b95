use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{send, send_ok, ApiError, MarketData, RetryPolicy, SymbolSearch};
use crate::models::{Config, PriceBar};

// Yahoo rejects requests without a browser-like agent
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
struct SearchQuote {
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
    #[serde(default)]
    adjclose: Vec<AdjCloseSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseSeries {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance search and chart client
pub struct YahooClient {
    http_client: Client,
    search_url: String,
    chart_url: String,
    retry: RetryPolicy,
}

impl YahooClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            search_url: config.yahoo_search_url.clone(),
            chart_url: config.yahoo_chart_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::exponential(3, Duration::from_secs(1), 2),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_chart(&self, symbol: &str, query: &[(&str, String)]) -> Result<Option<ChartResult>, ApiError> {
        let url = format!("{}/{}", self.chart_url, symbol);
        let url = url.as_str();

        self.retry
            .run("Yahoo chart", || async move {
                let response = send(self.http_client.get(url).query(query), url).await?;
                // Unknown symbols come back as 404 with an error body
                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !response.status().is_success() {
                    return Err(ApiError::Status {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    });
                }
                let chart: ChartResponse = response.json().await.map_err(|e| ApiError::decode(url, e))?;
                Ok(chart.chart.result.and_then(|results| results.into_iter().next()))
            })
            .await
    }
}

#[async_trait]
impl SymbolSearch for YahooClient {
    async fn search_symbol(&self, query: &str) -> Result<Option<String>, ApiError> {
        let url = self.search_url.as_str();
        let params = [
            ("q", query),
            ("quotesCount", "1"),
            ("newsCount", "0"),
            ("enableFuzzyQuery", "true"),
            ("quotesQueryId", "tss_match_phrase_query"),
        ];
        let params = &params;

        let response: SearchResponse = self
            .retry
            .run("Yahoo search", || async move {
                let response = send_ok(self.http_client.get(url).query(params), url).await?;
                response.json().await.map_err(|e| ApiError::decode(url, e))
            })
            .await?;

        let symbol = response
            .quotes
            .into_iter()
            .next()
            .and_then(|quote| quote.symbol)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        debug!("Search '{}' -> {:?}", query, symbol);
        Ok(symbol)
    }
}

#[async_trait]
impl MarketData for YahooClient {
    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, ApiError> {
        // period2 is exclusive, so extend to the start of the following day
        let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let period2 = (end + chrono::Duration::days(1)).and_time(NaiveTime::MIN).and_utc().timestamp();
        let query = [
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];

        Ok(self
            .fetch_chart(symbol, &query)
            .await?
            .map(bars_from_chart)
            .unwrap_or_default())
    }

    async fn latest_price(&self, symbol: &str) -> Result<Option<f64>, ApiError> {
        let query = [("range", "5d".to_string()), ("interval", "1d".to_string())];
        let result = self.fetch_chart(symbol, &query).await?;

        Ok(result
            .and_then(|r| r.meta)
            .and_then(|meta| meta.regular_market_price)
            .filter(|price| price.is_finite() && *price > 0.0))
    }
}

fn bars_from_chart(result: ChartResult) -> Vec<PriceBar> {
    let timestamps = result.timestamp.unwrap_or_default();
    let (closes, adj_closes) = match result.indicators {
        Some(indicators) => (
            indicators.quote.into_iter().next().map(|q| q.close).unwrap_or_default(),
            indicators.adjclose.into_iter().next().map(|a| a.adjclose).unwrap_or_default(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(PriceBar {
                date,
                close: closes.get(i).copied().flatten(),
                adj_close: adj_closes.get(i).copied().flatten(),
            })
        })
        .collect()
}
