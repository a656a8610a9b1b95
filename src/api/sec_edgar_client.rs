use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{send, send_ok, ApiError, FilingSource, RetryPolicy};
use crate::models::Config;

/// Submissions document returned by `data.sec.gov/submissions/CIK##########.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submissions {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub filings: FilingHistory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilingHistory {
    #[serde(default)]
    pub recent: RecentFilings,
}

/// Recent filings as parallel arrays; index `i` across all arrays is one filing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFilings {
    #[serde(default)]
    pub accession_number: Vec<String>,
    #[serde(default)]
    pub form: Vec<String>,
    #[serde(default)]
    pub primary_document: Vec<String>,
    #[serde(default)]
    pub report_date: Vec<String>,
    #[serde(default)]
    pub filing_date: Vec<String>,
}

/// SEC EDGAR client for submissions metadata and archive documents
pub struct SecEdgarClient {
    http_client: Client,
    data_url: String,
    rate_limiter: DefaultDirectRateLimiter,
    retry: RetryPolicy,
}

impl SecEdgarClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(config.sec_user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()?;

        // SEC fair-access limit is 10 requests per second
        let per_second = NonZeroU32::new(config.sec_requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            data_url: config.sec_data_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            retry: RetryPolicy::linear(
                config.retry_attempts,
                Duration::from_secs(config.retry_backoff_secs),
            ),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl FilingSource for SecEdgarClient {
    async fn get_submissions(&self, cik: &str) -> Result<Submissions, ApiError> {
        let url = format!("{}/submissions/CIK{}.json", self.data_url, pad_cik(cik));
        let url = url.as_str();
        debug!("Fetching submissions: {}", url);

        self.retry
            .run("EDGAR submissions", || async move {
                self.rate_limiter.until_ready().await;
                let response = send_ok(self.http_client.get(url), url).await?;
                response
                    .json::<Submissions>()
                    .await
                    .map_err(|e| ApiError::decode(url, e))
            })
            .await
    }

    async fn fetch_text(&self, url: &str) -> Result<Option<String>, ApiError> {
        debug!("Fetching document: {}", url);

        self.retry
            .run("EDGAR archive", || async move {
                self.rate_limiter.until_ready().await;
                let response = send(self.http_client.get(url), url).await?;
                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !response.status().is_success() {
                    return Err(ApiError::Status {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    });
                }
                let body = response.text().await.map_err(|e| ApiError::decode(url, e))?;
                Ok(Some(body))
            })
            .await
    }
}

/// Zero-pad a CIK to the 10 digits used by the submissions API
pub fn pad_cik(cik: &str) -> String {
    format!("{:0>10}", cik.trim())
}

/// CIK as it appears in archive paths (no leading zeros)
pub fn cik_path_segment(cik: &str) -> String {
    let cik = cik.trim();
    cik.parse::<u64>()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| cik.to_string())
}
