//! Fund lookup by CIK or name

use pretty_assertions::assert_eq;
use test_log::test;

use crate::common::database;
use holdings_tracker::models::DEFAULT_FUNDS;
use holdings_tracker::utils::select_fund;

#[test(tokio::test)]
async fn test_select_seeded_funds() {
    let db = database::init_fresh_test_database().await.unwrap();
    for seed in DEFAULT_FUNDS {
        db.get_or_create_fund(seed).await.unwrap();
    }
    let funds = db.list_funds().await.unwrap();

    let by_cik = select_fund(&funds, "1423053").unwrap();
    assert_eq!(by_cik.name, "Citadel Advisors");

    let by_name = select_fund(&funds, "renaissance").unwrap();
    assert_eq!(by_name.cik, "0001037389");

    let by_abbreviation = select_fund(&funds, "gates fdn").unwrap();
    assert_eq!(by_abbreviation.name, "Bill & Melinda Gates Foundation");

    assert!(select_fund(&funds, "1234567").is_none());
}
