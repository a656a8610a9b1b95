//! Insider, ETF, stock universe and enrichment collectors against a mocked FMP API

use std::sync::Arc;

use pretty_assertions::assert_eq;
use test_log::test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::api_mock::MockProviders;
use crate::common::{database, fixtures, logging, test_data};
use holdings_tracker::api::FmpClient;
use holdings_tracker::fundamentals::{EtfCollector, InsiderCollector, StockEnricher, StockUniverseCollector};

#[test(tokio::test)]
async fn test_insider_feed_page_is_stored_once() {
    logging::init_test_logging();

    let providers = MockProviders::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/insider-trading-rss-feed"))
        .and(query_param("page", "0"))
        .and(query_param("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::insider_feed()))
        .mount(&providers.fmp)
        .await;

    let db = database::init_fresh_test_database().await.unwrap();
    let client = Arc::new(FmpClient::new(&providers.config()).unwrap());
    let collector = InsiderCollector::new(db.clone(), client);

    let first = collector.collect_page(0).await.unwrap();
    assert_eq!(first.fetched, 3);
    assert_eq!(first.invalid, 1);
    assert_eq!(first.inserted, 2);

    let second = collector.collect_page(0).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(db.count_insider_trades().await.unwrap(), 2);
}

#[test(tokio::test)]
async fn test_insider_feed_failure_aborts_command() {
    logging::init_test_logging();

    let providers = MockProviders::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/insider-trading-rss-feed"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&providers.fmp)
        .await;

    let db = database::init_fresh_test_database().await.unwrap();
    let client = Arc::new(FmpClient::new(&providers.config()).unwrap());
    assert!(InsiderCollector::new(db, client).collect_page(0).await.is_err());
}

#[test(tokio::test)]
async fn test_etf_snapshots_are_upserted() {
    logging::init_test_logging();

    let providers = MockProviders::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/etf-holder/SPY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::etf_holders()))
        .mount(&providers.fmp)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/etf-holder/QQQ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&providers.fmp)
        .await;

    let db = database::init_fresh_test_database().await.unwrap();
    let client = Arc::new(FmpClient::new(&providers.config()).unwrap());
    let collector = EtfCollector::new(db.clone(), client);
    let symbols = vec!["SPY".to_string(), "QQQ".to_string()];

    let summary = collector.collect(&symbols).await;
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.empty, 1);

    let first = db.get_etf_holdings("SPY").await.unwrap().unwrap();
    collector.collect(&symbols).await;
    let second = db.get_etf_holdings("SPY").await.unwrap().unwrap();

    assert_eq!(second.holdings, fixtures::etf_holders());
    assert!(second.last_updated >= first.last_updated);
    assert!(db.get_etf_holdings("QQQ").await.unwrap().is_none());
}

#[test(tokio::test)]
async fn test_enrichment_replaces_placeholders() {
    logging::init_test_logging();

    let providers = MockProviders::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/profile/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::apple_profile()))
        .mount(&providers.fmp)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/profile/KO"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&providers.fmp)
        .await;

    let (db, fund) = database::init_database_with_fund().await.unwrap();
    let q3 = test_data::period(2024, 9, 30);
    for symbol in ["AAPL", "KO"] {
        db.upsert_holding(&test_data::create_test_holding(fund.id, symbol, q3, 1_000.0)).await.unwrap();
    }

    let client = Arc::new(FmpClient::new(&providers.config()).unwrap());
    let summary = StockEnricher::new(db.clone(), client).enrich_placeholders().await.unwrap();
    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.missing, 1);

    let apple = db.get_stock("AAPL").await.unwrap().unwrap();
    assert_eq!(apple.name.as_deref(), Some("Apple Inc."));
    assert_eq!(apple.industry.as_deref(), Some("Consumer Electronics"));
    assert_eq!(apple.market_cap, Some(3.4e12));
    assert_eq!(db.placeholder_stocks().await.unwrap(), vec!["KO".to_string()]);
}

#[test(tokio::test)]
async fn test_stock_universe_stores_valuation_metrics() {
    logging::init_test_logging();

    let providers = MockProviders::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/sp500_constituent"))
        .and(query_param("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::sp500_constituents()))
        .mount(&providers.fmp)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/profile/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::apple_profile()))
        .mount(&providers.fmp)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ratios-ttm/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::apple_ratios_ttm()))
        .mount(&providers.fmp)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/discounted-cash-flow/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::apple_dcf()))
        .mount(&providers.fmp)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/profile/KO"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&providers.fmp)
        .await;

    let db = database::init_fresh_test_database().await.unwrap();
    let client = Arc::new(FmpClient::new(&providers.config()).unwrap());
    let summary = StockUniverseCollector::new(db.clone(), client).collect(None).await.unwrap();
    assert_eq!(summary.constituents, 2);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.missing, 1);

    let apple = db.get_stock("AAPL").await.unwrap().unwrap();
    assert_eq!(apple.sector.as_deref(), Some("Technology"));
    let metrics = apple.valuation_metrics.unwrap();
    assert_eq!(metrics.dcf, Some(161.4));
    assert_eq!(metrics.stock_price, Some(228.0));
    assert_eq!(metrics.pe_ratio_ttm, Some(37.6));
    assert_eq!(metrics.dividend_yield_pct, Some(0.43));
    assert_eq!(metrics.dps_ttm, Some(0.98));
    assert_eq!(metrics.ev_ebitda_ttm, Some(26.8));
    assert!(db.get_stock("KO").await.unwrap().is_none());
}

#[test(tokio::test)]
async fn test_stock_universe_fails_without_constituent_list() {
    logging::init_test_logging();

    let providers = MockProviders::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/sp500_constituent"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&providers.fmp)
        .await;

    let db = database::init_fresh_test_database().await.unwrap();
    let client = Arc::new(FmpClient::new(&providers.config()).unwrap());
    assert!(StockUniverseCollector::new(db, client).collect(None).await.is_err());
}
