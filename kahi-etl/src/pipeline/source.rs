//! Where a pipeline gets the raw provider records for one identifier

use crate::db::{self, RawRecord};
use crate::index::CandidateIndex;
use crate::similarity::WorkKey;
use crate::types::{ProviderRole, WorkIdentifier};
use async_trait::async_trait;
use kahi_common::Result;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Raw records reported for one work, in any order
#[async_trait]
pub trait RawRecordSource: Send + Sync {
    async fn fetch(&self, identifier: &WorkIdentifier) -> Result<Vec<RawRecord>>;
}

/// Records from the staging table
///
/// DOIs are looked up directly. Citations go through the candidate index
/// of staged records that carry no DOI.
#[derive(Clone)]
pub struct StagedRecordSource {
    pool: SqlitePool,
    candidates: Arc<CandidateIndex>,
}

impl StagedRecordSource {
    pub fn new(pool: SqlitePool, candidates: Arc<CandidateIndex>) -> Self {
        Self { pool, candidates }
    }
}

#[async_trait]
impl RawRecordSource for StagedRecordSource {
    async fn fetch(&self, identifier: &WorkIdentifier) -> Result<Vec<RawRecord>> {
        match identifier {
            WorkIdentifier::Doi(doi) => {
                let mut records = db::load_raw_records_by_doi(&self.pool, doi).await?;
                // journal registry dumps are enrichment data, not work fragments
                records.retain(|r| r.provider.role() != ProviderRole::Registry);
                Ok(records)
            }
            WorkIdentifier::Citation { title, venue, year } => {
                let key = WorkKey::new(title, venue.clone(), *year);
                Ok(self.candidates.find(&key))
            }
        }
    }
}
