//! Canonical collections: JSON bodies plus a lookup key index
//!
//! Every record is written together with its lookup keys in one
//! transaction. `update_with` re-reads the stored body inside the
//! transaction before applying a change, so a patch never overwrites fields
//! it did not touch.

use crate::types::{alias_key, Author, ExternalId, Institution, Venue, Work};
use kahi_common::{uuid_utils, Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::fmt;
use uuid::Uuid;

pub const KEY_EXTERNAL_ID: &str = "external_id";
pub const KEY_ALIAS: &str = "alias";
pub const KEY_SERIAL: &str = "serial";

/// Canonical collection (one table each)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Documents,
    Authors,
    Institutions,
    Sources,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Documents,
        Collection::Authors,
        Collection::Institutions,
        Collection::Sources,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Collection::Documents => "documents",
            Collection::Authors => "authors",
            Collection::Institutions => "institutions",
            Collection::Sources => "sources",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// A canonical record persisted in one collection
pub trait Stored: Serialize + DeserializeOwned + Send + Sync + Unpin {
    const COLLECTION: Collection;

    /// `(kind, value)` pairs this record can be found by
    fn lookup_keys(&self) -> Vec<(&'static str, String)>;
}

fn external_id_keys(ids: &[ExternalId]) -> impl Iterator<Item = (&'static str, String)> + '_ {
    ids.iter().map(|id| (KEY_EXTERNAL_ID, id.value.clone()))
}

impl Stored for Work {
    const COLLECTION: Collection = Collection::Documents;

    fn lookup_keys(&self) -> Vec<(&'static str, String)> {
        external_id_keys(&self.external_ids).collect()
    }
}

impl Stored for Author {
    const COLLECTION: Collection = Collection::Authors;

    fn lookup_keys(&self) -> Vec<(&'static str, String)> {
        let mut keys: Vec<_> = external_id_keys(&self.external_ids).collect();
        keys.push((KEY_ALIAS, alias_key(&self.full_name)));
        keys.extend(self.aliases.keys().into_iter().map(|k| (KEY_ALIAS, k)));
        keys
    }
}

impl Stored for Institution {
    const COLLECTION: Collection = Collection::Institutions;

    fn lookup_keys(&self) -> Vec<(&'static str, String)> {
        let mut keys: Vec<_> = external_id_keys(&self.external_ids).collect();
        keys.push((KEY_ALIAS, alias_key(&self.name)));
        keys.extend(self.aliases.keys().into_iter().map(|k| (KEY_ALIAS, k)));
        keys
    }
}

impl Stored for Venue {
    const COLLECTION: Collection = Collection::Sources;

    fn lookup_keys(&self) -> Vec<(&'static str, String)> {
        let mut keys: Vec<_> = external_id_keys(&self.external_ids).collect();
        keys.extend(self.serials.iter().map(|s| (KEY_SERIAL, s.value.clone())));
        keys
    }
}

async fn write_keys(
    conn: &mut SqliteConnection,
    collection: Collection,
    id: Uuid,
    keys: &[(&'static str, String)],
) -> Result<()> {
    sqlx::query("DELETE FROM entity_keys WHERE collection = ? AND entity_id = ?")
        .bind(collection.table())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    for (kind, value) in keys {
        if value.trim().is_empty() {
            continue;
        }
        sqlx::query(
            "INSERT OR IGNORE INTO entity_keys (collection, kind, value, entity_id) VALUES (?, ?, ?, ?)",
        )
        .bind(collection.table())
        .bind(*kind)
        .bind(value)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Insert a new record under a fresh id
pub async fn insert<T: Stored>(pool: &SqlitePool, record: &T) -> Result<Uuid> {
    let id = uuid_utils::generate();
    let body = serde_json::to_string(record)?;
    let sql = format!("INSERT INTO {} (id, body) VALUES (?, ?)", T::COLLECTION.table());

    let mut tx = pool.begin().await?;
    sqlx::query(&sql)
        .bind(id.to_string())
        .bind(&body)
        .execute(&mut *tx)
        .await?;
    write_keys(&mut *tx, T::COLLECTION, id, &record.lookup_keys()).await?;
    tx.commit().await?;

    tracing::debug!(collection = %T::COLLECTION, id = %id, "Inserted record");
    Ok(id)
}

/// Load one record by id
pub async fn load<T: Stored>(pool: &SqlitePool, id: Uuid) -> Result<Option<T>> {
    let sql = format!("SELECT body FROM {} WHERE id = ?", T::COLLECTION.table());
    let body: Option<String> = sqlx::query_scalar(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

/// Every record of a collection, oldest first
pub async fn load_all<T: Stored>(pool: &SqlitePool) -> Result<Vec<(Uuid, T)>> {
    let sql = format!("SELECT id, body FROM {} ORDER BY created_at, id", T::COLLECTION.table());
    let rows: Vec<(String, String)> = sqlx::query_as(&sql).fetch_all(pool).await?;

    rows.into_iter()
        .map(|(id, body)| Ok((uuid_utils::parse(&id)?, serde_json::from_str(&body)?)))
        .collect()
}

/// Oldest record carrying lookup key `(kind, value)`
pub async fn find_by_key<T: Stored>(pool: &SqlitePool, kind: &str, value: &str) -> Result<Option<(Uuid, T)>> {
    let sql = format!(
        r#"
        SELECT c.id, c.body
        FROM entity_keys k
        JOIN {table} c ON c.id = k.entity_id
        WHERE k.collection = ? AND k.kind = ? AND k.value = ?
        ORDER BY c.created_at, c.id
        LIMIT 1
        "#,
        table = T::COLLECTION.table()
    );

    let row: Option<(String, String)> = sqlx::query_as(&sql)
        .bind(T::COLLECTION.table())
        .bind(kind)
        .bind(value)
        .fetch_optional(pool)
        .await?;

    match row {
        Some((id, body)) => Ok(Some((uuid_utils::parse(&id)?, serde_json::from_str(&body)?))),
        None => Ok(None),
    }
}

/// First record sharing any of `ids`, tried in order
pub async fn find_by_any_external_id<T: Stored>(
    pool: &SqlitePool,
    ids: &[ExternalId],
) -> Result<Option<(Uuid, T)>> {
    for id in ids {
        if let Some(found) = find_by_key(pool, KEY_EXTERNAL_ID, &id.value).await? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Read-modify-write of one record in a single transaction
///
/// `apply` sees the body as currently stored. Returns the written record.
pub async fn update_with<T, F>(pool: &SqlitePool, id: Uuid, apply: F) -> Result<T>
where
    T: Stored,
    F: FnOnce(&mut T) + Send,
{
    let table = T::COLLECTION.table();
    let select = format!("SELECT body FROM {} WHERE id = ?", table);
    let update = format!(
        "UPDATE {} SET body = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        table
    );

    let touch = format!("UPDATE {} SET updated_at = updated_at WHERE id = ?", table);

    let mut tx = pool.begin().await?;

    // write first so the transaction holds the write lock before reading;
    // a read-then-upgrade can fail with SQLITE_BUSY under concurrent workers
    sqlx::query(&touch).bind(id.to_string()).execute(&mut *tx).await?;

    let body: Option<String> = sqlx::query_scalar(&select)
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
    let body = body.ok_or_else(|| Error::NotFound(format!("{} record {}", table, id)))?;

    let mut record: T = serde_json::from_str(&body)?;
    apply(&mut record);

    sqlx::query(&update)
        .bind(serde_json::to_string(&record)?)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    write_keys(&mut *tx, T::COLLECTION, id, &record.lookup_keys()).await?;
    tx.commit().await?;

    tracing::debug!(collection = %T::COLLECTION, id = %id, "Updated record");
    Ok(record)
}

/// Number of records in a collection
pub async fn count(pool: &SqlitePool, collection: Collection) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", collection.table());
    Ok(sqlx::query_scalar(&sql).fetch_one(pool).await?)
}

// ============================================================================
// Typed lookups used by the linker
// ============================================================================

pub async fn find_document_by_external_id(pool: &SqlitePool, ids: &[ExternalId]) -> Result<Option<(Uuid, Work)>> {
    find_by_any_external_id(pool, ids).await
}

pub async fn find_author_by_external_id(pool: &SqlitePool, ids: &[ExternalId]) -> Result<Option<(Uuid, Author)>> {
    find_by_any_external_id(pool, ids).await
}

/// Author with `name` as full name or alias (case-insensitive)
pub async fn find_author_by_alias(pool: &SqlitePool, name: &str) -> Result<Option<(Uuid, Author)>> {
    find_by_key(pool, KEY_ALIAS, &alias_key(name)).await
}

/// Institution carrying an external id with this exact value
pub async fn find_institution_by_external_id(pool: &SqlitePool, value: &str) -> Result<Option<(Uuid, Institution)>> {
    find_by_key(pool, KEY_EXTERNAL_ID, value).await
}

pub async fn find_institution_by_alias(pool: &SqlitePool, name: &str) -> Result<Option<(Uuid, Institution)>> {
    find_by_key(pool, KEY_ALIAS, &alias_key(name)).await
}

/// Venue by dash-stripped serial number
pub async fn find_source_by_serial(pool: &SqlitePool, serial: &str) -> Result<Option<(Uuid, Venue)>> {
    find_by_key(pool, KEY_SERIAL, &crate::types::normalize_serial(serial)).await
}

pub async fn find_source_by_external_id(pool: &SqlitePool, ids: &[ExternalId]) -> Result<Option<(Uuid, Venue)>> {
    find_by_any_external_id(pool, ids).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database_pool;
    use crate::types::{AliasSet, Serial, SerialKind};
    use tempfile::TempDir;

    async fn pool() -> (TempDir, SqlitePool) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database_pool(&temp_dir.path().join("kahi.db")).await.unwrap();
        (temp_dir, pool)
    }

    fn author(name: &str, orcid: &str) -> Author {
        Author {
            full_name: name.to_string(),
            aliases: AliasSet::from_iter([name]),
            external_ids: vec![ExternalId::new("orcid", orcid)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let (_dir, pool) = pool().await;
        let id = insert(&pool, &author("Alan Turing", "0000-0001")).await.unwrap();

        let loaded: Author = load(&pool, id).await.unwrap().unwrap();
        assert_eq!(loaded.full_name, "Alan Turing");
        assert!(load::<Author>(&pool, uuid_utils::generate()).await.unwrap().is_none());
        assert_eq!(count(&pool, Collection::Authors).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_by_alias_case_insensitive() {
        let (_dir, pool) = pool().await;
        let id = insert(&pool, &author("Alan Turing", "0000-0001")).await.unwrap();

        let (found, _) = find_author_by_alias(&pool, "ALAN  turing").await.unwrap().unwrap();
        assert_eq!(found, id);
        assert!(find_author_by_alias(&pool, "A. Turing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_any_external_id_in_order() {
        let (_dir, pool) = pool().await;
        let id = insert(&pool, &author("Alan Turing", "0000-0001")).await.unwrap();

        let ids = vec![ExternalId::new("scopus", "999"), ExternalId::new("orcid", "0000-0001")];
        let (found, record) = find_author_by_external_id(&pool, &ids).await.unwrap().unwrap();
        assert_eq!(found, id);
        assert_eq!(record.full_name, "Alan Turing");
    }

    #[tokio::test]
    async fn test_update_with_rewrites_keys() {
        let (_dir, pool) = pool().await;
        let id = insert(&pool, &author("Alan Turing", "0000-0001")).await.unwrap();

        let updated: Author = update_with(&pool, id, |a: &mut Author| {
            a.aliases.insert("A. M. Turing");
        })
        .await
        .unwrap();
        assert_eq!(updated.aliases.len(), 2);

        let (found, _) = find_author_by_alias(&pool, "a. m. turing").await.unwrap().unwrap();
        assert_eq!(found, id);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let (_dir, pool) = pool().await;
        let result = update_with(&pool, uuid_utils::generate(), |_: &mut Author| {}).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_source_by_serial_ignores_dashes() {
        let (_dir, pool) = pool().await;
        let venue = Venue {
            title: Some("Revista Colombiana".into()),
            serials: vec![Serial::new(SerialKind::Pissn, "0120-4157")],
            ..Default::default()
        };
        let id = insert(&pool, &venue).await.unwrap();

        let (found, _) = find_source_by_serial(&pool, "01204157").await.unwrap().unwrap();
        assert_eq!(found, id);
        let (found, _) = find_source_by_serial(&pool, "0120-4157").await.unwrap().unwrap();
        assert_eq!(found, id);
    }

    #[tokio::test]
    async fn test_load_all_oldest_first() {
        let (_dir, pool) = pool().await;
        insert(&pool, &Institution { name: "Universidad de Antioquia".into(), ..Default::default() })
            .await
            .unwrap();
        let all: Vec<(Uuid, Institution)> = load_all(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1.name, "Universidad de Antioquia");
    }
}
