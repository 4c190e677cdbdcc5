//! Database access for kahi-etl
//!
//! Canonical collections (`documents`, `authors`, `institutions`,
//! `sources`) hold one JSON body per record keyed by an opaque UUID.
//! `entity_keys` indexes the values the linker searches by: external id
//! values, lowercased aliases and serial numbers. Provider raw records wait
//! in `raw_records` until a pipeline run picks them up.

pub mod collections;
pub mod raw_records;

pub use collections::{
    count, find_author_by_alias, find_author_by_external_id, find_by_any_external_id, find_by_key,
    find_document_by_external_id, find_institution_by_alias, find_institution_by_external_id,
    find_source_by_external_id, find_source_by_serial, insert, load, load_all, update_with,
    Collection, Stored,
};
pub use raw_records::{
    count_raw_records, find_raw_record_by_key, list_staged_dois, load_raw_records_by_doi,
    load_raw_records_without_doi, stage_raw_record, RawRecord,
};

use kahi_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (creating if needed) the database and its tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create tables and indexes if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    for collection in Collection::ALL {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            collection.table()
        );
        sqlx::query(&ddl).execute(pool).await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entity_keys (
            collection TEXT NOT NULL,
            kind TEXT NOT NULL,
            value TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            PRIMARY KEY (collection, kind, value, entity_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entity_keys_entity ON entity_keys (collection, entity_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider TEXT NOT NULL,
            doi TEXT,
            body TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            staged_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (provider, content_hash)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_raw_records_doi ON raw_records (doi)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_record_keys (
            record_id INTEGER NOT NULL REFERENCES raw_records(id),
            kind TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (record_id, kind, value)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_raw_record_keys_value ON raw_record_keys (kind, value)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (documents, authors, institutions, sources, entity_keys, raw_records)");

    Ok(())
}
