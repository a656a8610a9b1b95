//! Wiremock stand-ins for the SEC, Yahoo and FMP endpoints

use std::sync::Arc;
use std::time::Duration;

use holdings_tracker::api::{RetryPolicy, SecEdgarClient, YahooClient};
use holdings_tracker::data_collector::{CollectorSettings, ThirteenFCollector};
use holdings_tracker::database::DatabaseManager;
use holdings_tracker::models::Config;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures;

pub struct MockProviders {
    pub sec: MockServer,
    pub yahoo: MockServer,
    pub fmp: MockServer,
}

impl MockProviders {
    pub async fn start() -> Self {
        Self {
            sec: MockServer::start().await,
            yahoo: MockServer::start().await,
            fmp: MockServer::start().await,
        }
    }

    /// Configuration pointing every client at the mock servers, with no delays
    pub fn config(&self) -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            fmp_api_key: Some("test-key".to_string()),
            sec_data_url: self.sec.uri(),
            sec_archive_url: self.sec.uri(),
            yahoo_search_url: format!("{}/v1/finance/search", self.yahoo.uri()),
            yahoo_chart_url: format!("{}/v8/finance/chart", self.yahoo.uri()),
            fmp_base_url: format!("{}/api", self.fmp.uri()),
            retry_backoff_secs: 0,
            filing_delay_secs: 0,
            sec_requests_per_second: 100,
            ..Config::default()
        }
    }

    /// Collector wired to the mock servers with instant retries
    pub fn collector(&self, config: &Config, database: DatabaseManager) -> ThirteenFCollector {
        let retry = RetryPolicy::linear(3, Duration::ZERO);
        let sec = SecEdgarClient::new(config).unwrap().with_retry(retry.clone());
        let yahoo = Arc::new(YahooClient::new(config).unwrap().with_retry(retry));

        ThirteenFCollector::new(
            database,
            Arc::new(sec),
            yahoo.clone(),
            yahoo,
            &config.sec_archive_url,
            CollectorSettings::from_config(config),
        )
    }

    /// Submissions, both filing directories and their information tables
    pub async fn mount_berkshire_filings(&self) {
        Mock::given(method("GET"))
            .and(path(format!("/submissions/CIK{}.json", fixtures::BERKSHIRE_CIK)))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::berkshire_submissions()))
            .mount(&self.sec)
            .await;

        let latest = fixtures::filing_dir(fixtures::LATEST_ACCESSION);
        Mock::given(method("GET"))
            .and(path(format!("{}/{}-index.html", latest, fixtures::LATEST_ACCESSION)))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixtures::latest_index_html()))
            .mount(&self.sec)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/46994.xml", latest)))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixtures::LATEST_INFO_TABLE))
            .mount(&self.sec)
            .await;

        // The older filing has no index page, so the locator falls back to infotable.xml
        let older = fixtures::filing_dir(fixtures::OLDER_ACCESSION);
        Mock::given(method("GET"))
            .and(path(format!("{}/infotable.xml", older)))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixtures::OLDER_INFO_TABLE))
            .mount(&self.sec)
            .await;
    }

    /// Search hits for Apple and Coca-Cola, misses for everything else, and
    /// price data for any symbol
    pub async fn mount_market_data(&self) {
        for (query, symbol) in [("APPLE", "AAPL"), ("COCA COLA", "KO")] {
            Mock::given(method("GET"))
                .and(path("/v1/finance/search"))
                .and(query_param("q", query))
                .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::search_hit(symbol)))
                .with_priority(1)
                .mount(&self.yahoo)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::search_miss()))
            .with_priority(10)
            .mount(&self.yahoo)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/v8/finance/chart/[A-Z.\-]+$"))
            .and(query_param("includeAdjustedClose", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::q3_2024_chart()))
            .mount(&self.yahoo)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v8/finance/chart/[A-Z.\-]+$"))
            .and(query_param("range", "5d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::latest_quote_chart(190.5)))
            .mount(&self.yahoo)
            .await;
    }
}
