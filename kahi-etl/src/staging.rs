//! Loading provider dumps (one JSON record per line) into staging

use crate::db;
use crate::normalizer::doaj::{parse_journal, staging_keys};
use crate::types::{normalize_doi, Provider};
use kahi_common::Result;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Counts from one staging run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSummary {
    pub lines: usize,
    pub staged: usize,
    pub duplicates: usize,
    pub malformed: usize,
}

/// DOI a raw record is staged under
///
/// Canonical fragments carry it in `document.external_ids`; the small
/// providers put it at the top level.
pub fn staged_doi(body: &Value) -> Option<String> {
    let from_ids = body
        .pointer("/document/external_ids")
        .and_then(Value::as_array)
        .and_then(|ids| {
            ids.iter().find_map(|id| {
                let source = id.get("source")?.as_str()?;
                if source.eq_ignore_ascii_case("doi") {
                    id.get("value")?.as_str().map(String::from)
                } else {
                    None
                }
            })
        });

    from_ids
        .or_else(|| body.get("doi").and_then(Value::as_str).map(String::from))
        .map(|doi| normalize_doi(&doi))
        .filter(|doi| !doi.is_empty())
}

/// Stage one raw record; `Ok(false)` when it was already staged
pub async fn stage_record(pool: &SqlitePool, provider: Provider, body: &Value) -> Result<bool> {
    if provider == Provider::Doaj {
        let journal = parse_journal(body).map_err(|e| kahi_common::Error::InvalidInput(e.to_string()))?;
        return db::stage_raw_record(pool, provider, None, body, &staging_keys(&journal)).await;
    }
    let doi = staged_doi(body);
    db::stage_raw_record(pool, provider, doi.as_deref(), body, &[]).await
}

/// Stage every line of a JSONL dump; bad lines are counted and skipped
pub async fn stage_jsonl<R>(pool: &SqlitePool, provider: Provider, reader: R) -> Result<StageSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = StageSummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        summary.lines += 1;

        let body: Value = match serde_json::from_str(&line) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(provider = %provider, line = summary.lines, error = %e, "Skipping malformed JSON line");
                summary.malformed += 1;
                continue;
            }
        };

        match stage_record(pool, provider, &body).await {
            Ok(true) => summary.staged += 1,
            Ok(false) => summary.duplicates += 1,
            Err(kahi_common::Error::InvalidInput(reason)) => {
                tracing::warn!(provider = %provider, line = summary.lines, reason = %reason, "Skipping unreadable record");
                summary.malformed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        provider = %provider,
        lines = summary.lines,
        staged = summary.staged,
        duplicates = summary.duplicates,
        malformed = summary.malformed,
        "Staging finished"
    );
    Ok(summary)
}
