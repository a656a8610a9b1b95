//! Test databases backed by the real DatabaseManager

use anyhow::Result;
use holdings_tracker::database::DatabaseManager;
use holdings_tracker::models::Fund;
use tempfile::TempDir;

/// File-backed database that lives as long as its temp directory
pub struct TestDatabase {
    pub manager: DatabaseManager,
    pub url: String,
    _dir: TempDir,
}

/// Private in-memory database with the schema applied
pub async fn init_fresh_test_database() -> Result<DatabaseManager> {
    DatabaseManager::in_memory().await
}

/// File-backed database in a fresh temp directory
pub async fn init_file_test_database() -> Result<TestDatabase> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite:{}", dir.path().join("holdings.db").display());
    let manager = DatabaseManager::new(&url).await?;
    Ok(TestDatabase { manager, url, _dir: dir })
}

/// Fresh in-memory database with the first default fund seeded
pub async fn init_database_with_fund() -> Result<(DatabaseManager, Fund)> {
    let db = init_fresh_test_database().await?;
    let (fund, _) = db.get_or_create_fund(&super::test_data::create_test_fund_seed()).await?;
    Ok((db, fund))
}
