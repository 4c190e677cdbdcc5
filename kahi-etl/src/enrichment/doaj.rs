//! Open-access journal registry (DOAJ) lookups
//!
//! Two implementations: the live DOAJ search API, and staged DOAJ journal
//! dumps in the raw-record table (keyed by dash-stripped ISSN).

use super::{build_http_client, rate_limiter, DirectRateLimiter, OpenAccessJournal, OpenAccessRegistry};
use crate::db;
use crate::error::EnrichmentError;
use crate::normalizer::doaj::{parse_journal, ISSN_KEY};
use crate::types::{normalize_serial, Provider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::time::Duration;

pub const DEFAULT_DOAJ_URL: &str = "https://doaj.org/api";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    results: Vec<Value>,
}

/// DOAJ public search API client
pub struct DoajClient {
    client: Client,
    base_url: String,
    rate_limiter: DirectRateLimiter,
}

impl DoajClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EnrichmentError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            // DOAJ throttles at 2 requests per second per IP
            rate_limiter: rate_limiter(2),
        })
    }
}

fn first_journal(response: SearchResponse, issn: &str) -> Result<OpenAccessJournal, EnrichmentError> {
    let first = response
        .results
        .into_iter()
        .next()
        .filter(|_| response.total > 0)
        .ok_or_else(|| EnrichmentError::NotFound(format!("ISSN {}", issn)))?;
    parse_journal(&first).map_err(|e| EnrichmentError::Decode(format!("DOAJ journal: {}", e)))
}

#[async_trait]
impl OpenAccessRegistry for DoajClient {
    async fn lookup_issn(&self, issn: &str) -> Result<OpenAccessJournal, EnrichmentError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/search/journals/issn:{}", self.base_url, issn);
        tracing::debug!(issn = %issn, "Querying DOAJ");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::Decode(format!("DOAJ response: {}", e)))?;

        first_journal(body, issn)
    }
}

/// DOAJ journals staged in the raw-record table
pub struct StagedOpenAccessRegistry {
    pool: SqlitePool,
}

impl StagedOpenAccessRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OpenAccessRegistry for StagedOpenAccessRegistry {
    async fn lookup_issn(&self, issn: &str) -> Result<OpenAccessJournal, EnrichmentError> {
        let key = normalize_serial(issn);
        let record = db::find_raw_record_by_key(&self.pool, Provider::Doaj, ISSN_KEY, &key)
            .await
            .map_err(|e| EnrichmentError::Decode(format!("staged DOAJ lookup: {}", e)))?
            .ok_or_else(|| EnrichmentError::NotFound(format!("ISSN {}", issn)))?;

        parse_journal(&record.body).map_err(|e| EnrichmentError::Decode(format!("DOAJ journal: {}", e)))
    }
}
