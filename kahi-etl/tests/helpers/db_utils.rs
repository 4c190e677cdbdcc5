//! Database test utilities

use anyhow::Result;
use kahi_etl::db;
use kahi_etl::types::Provider;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Temporary database with tables created
///
/// The `TempDir` must outlive the pool.
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let pool = db::init_database_pool(&temp_dir.path().join("kahi_test.db")).await?;
    Ok((temp_dir, pool))
}

/// Stage one raw record the way `kahi-etl stage` does
pub async fn stage(pool: &SqlitePool, provider: Provider, body: &Value) {
    kahi_etl::staging::stage_record(pool, provider, body)
        .await
        .expect("staging failed");
}
