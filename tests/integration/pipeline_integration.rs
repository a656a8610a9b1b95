//! End-to-end 13F collection against mocked SEC and Yahoo endpoints

use pretty_assertions::assert_eq;
use test_log::test;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::api_mock::MockProviders;
use crate::common::{database, fixtures, logging, test_data};
use holdings_tracker::models::Config;
use holdings_tracker::thirteen_f::CollectionMode;

#[test(tokio::test)]
async fn test_latest_filing_is_collected_and_rerun_is_idempotent() {
    logging::init_test_logging();
    logging::log_test_step("Collecting the latest Berkshire 13F");

    let providers = MockProviders::start().await;
    providers.mount_berkshire_filings().await;
    providers.mount_market_data().await;

    let config = providers.config();
    let (db, fund) = database::init_database_with_fund().await.unwrap();
    let mut collector = providers.collector(&config, db.clone());

    let summary = collector.run_for_fund(&fund, CollectionMode::Latest).await.unwrap();
    logging::log_test_data("First run", &summary);
    assert_eq!(summary.filings_seen, 1);
    assert_eq!(summary.periods_processed, 1);
    assert_eq!(summary.holdings_saved, 2);
    assert_eq!(summary.unresolved, 1);

    let q3 = test_data::period(2024, 9, 30);
    let holdings = db.holdings_for_period(fund.id, q3, None).await.unwrap();
    assert_eq!(holdings.len(), 2);
    assert_eq!(holdings[0].symbol, "AAPL");
    assert_eq!(holdings[0].value, 69_900_000_000.0);
    assert_eq!(holdings[0].shares, 300_000_000.0);
    assert_eq!(holdings[0].avg_buy_price, 220.0);
    assert_eq!(holdings[1].symbol, "KO");

    let stock = db.get_stock("KO").await.unwrap().unwrap();
    assert_eq!(stock.sector.as_deref(), Some("Unknown"));

    // Two rows do not reach the skip threshold, so the period is upserted again
    let rerun = collector.run_for_fund(&fund, CollectionMode::Latest).await.unwrap();
    assert_eq!(rerun.periods_processed, 1);
    assert_eq!(db.count_holdings(fund.id).await.unwrap(), 2);
    assert_eq!(db.holdings_for_period(fund.id, q3, None).await.unwrap(), holdings);
}

#[test(tokio::test)]
async fn test_populated_period_is_skipped() {
    logging::init_test_logging();

    let providers = MockProviders::start().await;
    providers.mount_berkshire_filings().await;
    providers.mount_market_data().await;

    let config = Config {
        skip_threshold: 1,
        ..providers.config()
    };
    let (db, fund) = database::init_database_with_fund().await.unwrap();
    let mut collector = providers.collector(&config, db.clone());

    collector.run_for_fund(&fund, CollectionMode::Latest).await.unwrap();
    let rerun = collector.run_for_fund(&fund, CollectionMode::Latest).await.unwrap();
    assert_eq!(rerun.periods_skipped, 1);
    assert_eq!(rerun.periods_processed, 0);
    assert_eq!(rerun.holdings_saved, 0);
}

#[test(tokio::test)]
async fn test_historical_mode_uses_fallback_document_and_thousands() {
    logging::init_test_logging();
    logging::log_test_step("Backfilling every listed 13F");

    let providers = MockProviders::start().await;
    providers.mount_berkshire_filings().await;
    providers.mount_market_data().await;

    let config = providers.config();
    let (db, fund) = database::init_database_with_fund().await.unwrap();
    let mut collector = providers.collector(&config, db.clone());

    let summary = collector.run_for_fund(&fund, CollectionMode::Historical).await.unwrap();
    assert_eq!(summary.filings_seen, 2);
    assert_eq!(summary.periods_processed, 2);

    let q3_2022 = test_data::period(2022, 9, 30);
    let older = db.holdings_for_period(fund.id, q3_2022, None).await.unwrap();
    assert_eq!(older.len(), 1);
    assert_eq!(older[0].symbol, "AAPL");
    assert_eq!(older[0].value, 50_000_000.0);
    // no bars inside the 2022 window, so the spot price is used
    assert_eq!(older[0].avg_buy_price, 190.5);

    assert_eq!(
        db.report_periods(fund.id).await.unwrap(),
        vec![q3_2022, test_data::period(2024, 9, 30)]
    );
}

#[test(tokio::test)]
async fn test_rate_limited_submissions_are_retried() {
    logging::init_test_logging();

    let providers = MockProviders::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/submissions/CIK{}.json", fixtures::BERKSHIRE_CIK)))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&providers.sec)
        .await;
    providers.mount_berkshire_filings().await;
    providers.mount_market_data().await;

    let config = providers.config();
    let (db, fund) = database::init_database_with_fund().await.unwrap();
    let mut collector = providers.collector(&config, db.clone());

    let summary = collector.run_for_fund(&fund, CollectionMode::Latest).await.unwrap();
    assert_eq!(summary.holdings_saved, 2);
}

#[test(tokio::test)]
async fn test_unreachable_registry_and_malformed_tables_collect_nothing() {
    logging::init_test_logging();

    let providers = MockProviders::start().await;
    providers.mount_market_data().await;
    let config = providers.config();
    let (db, fund) = database::init_database_with_fund().await.unwrap();

    // no submissions mounted: the registry answers 404
    let mut collector = providers.collector(&config, db.clone());
    let summary = collector.run_for_fund(&fund, CollectionMode::Latest).await.unwrap();
    assert_eq!(summary.filings_seen, 0);

    Mock::given(method("GET"))
        .and(path(format!("{}/46994.xml", fixtures::filing_dir(fixtures::LATEST_ACCESSION))))
        .respond_with(ResponseTemplate::new(200).set_body_string("<informationTable><infoTable>"))
        .with_priority(1)
        .mount(&providers.sec)
        .await;
    providers.mount_berkshire_filings().await;

    let summary = collector.run_for_fund(&fund, CollectionMode::Latest).await.unwrap();
    assert_eq!(summary.filings_seen, 1);
    assert_eq!(summary.empty_documents, 1);
    assert_eq!(db.count_holdings(fund.id).await.unwrap(), 0);
}
