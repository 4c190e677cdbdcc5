//! Staged provider raw records
//!
//! Raw JSON exactly as a provider delivered it, deduplicated per provider
//! by content hash. Extra lookup keys (ISSNs of DOAJ journals, citation
//! titles of records without a DOI) go to `raw_record_keys`.

use crate::types::{normalize_doi, Provider};
use kahi_common::{Error, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

/// One staged raw record
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: i64,
    pub provider: Provider,
    pub doi: Option<String>,
    pub body: Value,
    pub staged_at: String,
}

type RawRow = (i64, String, Option<String>, String, String);

impl TryFrom<RawRow> for RawRecord {
    type Error = Error;

    fn try_from((id, provider, doi, body, staged_at): RawRow) -> Result<Self> {
        Ok(Self {
            id,
            provider: provider.parse().map_err(Error::Internal)?,
            doi,
            body: serde_json::from_str(&body)?,
            staged_at,
        })
    }
}

fn content_hash(provider: Provider, body: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(body.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stage a raw record; returns `false` if the identical record was already staged
pub async fn stage_raw_record(
    pool: &SqlitePool,
    provider: Provider,
    doi: Option<&str>,
    body: &Value,
    keys: &[(&str, String)],
) -> Result<bool> {
    let doi = doi.map(normalize_doi).filter(|d| !d.is_empty());
    let hash = content_hash(provider, body);

    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        "INSERT OR IGNORE INTO raw_records (provider, doi, body, content_hash) VALUES (?, ?, ?, ?)",
    )
    .bind(provider.as_str())
    .bind(doi.as_deref())
    .bind(body.to_string())
    .bind(&hash)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        tracing::debug!(provider = %provider, "Raw record already staged");
        return Ok(false);
    }

    let record_id = result.last_insert_rowid();
    for (kind, value) in keys {
        sqlx::query("INSERT OR IGNORE INTO raw_record_keys (record_id, kind, value) VALUES (?, ?, ?)")
            .bind(record_id)
            .bind(*kind)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(true)
}

const SELECT_RAW: &str = "SELECT r.id, r.provider, r.doi, r.body, r.staged_at FROM raw_records r";

/// Every staged record for a DOI, in staging order
pub async fn load_raw_records_by_doi(pool: &SqlitePool, doi: &str) -> Result<Vec<RawRecord>> {
    let sql = format!("{} WHERE r.doi = ? ORDER BY r.id", SELECT_RAW);
    let rows: Vec<RawRow> = sqlx::query_as(&sql)
        .bind(normalize_doi(doi))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(RawRecord::try_from).collect()
}

/// Staged records that carry no DOI, in staging order
pub async fn load_raw_records_without_doi(pool: &SqlitePool) -> Result<Vec<RawRecord>> {
    let sql = format!("{} WHERE r.doi IS NULL ORDER BY r.id", SELECT_RAW);
    let rows: Vec<RawRow> = sqlx::query_as(&sql).fetch_all(pool).await?;
    rows.into_iter().map(RawRecord::try_from).collect()
}

/// Most recently staged record of `provider` with key `(kind, value)`
pub async fn find_raw_record_by_key(
    pool: &SqlitePool,
    provider: Provider,
    kind: &str,
    value: &str,
) -> Result<Option<RawRecord>> {
    let sql = format!(
        "{} JOIN raw_record_keys k ON k.record_id = r.id \
         WHERE r.provider = ? AND k.kind = ? AND k.value = ? ORDER BY r.id DESC LIMIT 1",
        SELECT_RAW
    );
    let row: Option<RawRow> = sqlx::query_as(&sql)
        .bind(provider.as_str())
        .bind(kind)
        .bind(value)
        .fetch_optional(pool)
        .await?;
    row.map(RawRecord::try_from).transpose()
}

/// Distinct staged DOIs, in first-staged order
pub async fn list_staged_dois(pool: &SqlitePool) -> Result<Vec<String>> {
    Ok(sqlx::query_scalar(
        "SELECT doi FROM raw_records WHERE doi IS NOT NULL GROUP BY doi ORDER BY MIN(id)",
    )
    .fetch_all(pool)
    .await?)
}

/// Staged record count per provider
pub async fn count_raw_records(pool: &SqlitePool) -> Result<Vec<(Provider, i64)>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT provider, COUNT(*) FROM raw_records GROUP BY provider ORDER BY provider")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(provider, n)| match provider.parse::<Provider>() {
            Ok(p) => Some((p, n)),
            Err(e) => {
                tracing::warn!("Ignoring staged records: {}", e);
                None
            }
        })
        .collect())
}
