//! Read-only in-memory indexes, built once per run
//!
//! Workers share them through `Arc`; nothing writes to them after
//! construction. Records created during the run are not added, the store
//! lookups cover those.

use crate::db::{self, RawRecord};
use crate::normalizer::NormalizerRegistry;
use crate::similarity::{first_work_match, MatchCandidate, WorkKey, AFFILIATION_NAMES};
use crate::types::{Institution, ProviderRecord, ProviderRole};
use kahi_common::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

/// Institution names and aliases for fuzzy affiliation lookup
#[derive(Debug, Default)]
pub struct InstitutionIndex {
    entries: Vec<(Uuid, String)>,
}

impl InstitutionIndex {
    /// Index every stored institution under its name and aliases
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let institutions: Vec<(Uuid, Institution)> = db::load_all(pool).await?;
        let index = Self::from_institutions(&institutions);
        tracing::info!(
            institutions = institutions.len(),
            names = index.len(),
            "Institution name index built"
        );
        Ok(index)
    }

    pub fn from_institutions(institutions: &[(Uuid, Institution)]) -> Self {
        let mut entries = Vec::new();
        for (id, institution) in institutions {
            entries.push((*id, institution.name.clone()));
            for alias in institution.aliases.iter() {
                if !alias.eq_ignore_ascii_case(&institution.name) {
                    entries.push((*id, alias.to_string()));
                }
            }
        }
        Self { entries }
    }

    /// Best fuzzy match for an affiliation name
    pub fn find(&self, name: &str) -> Option<MatchCandidate<Uuid>> {
        AFFILIATION_NAMES.best_match(name, self.entries.iter().map(|(id, n)| (*id, n.clone())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Work key of a parsed record: first title, venue title, year
pub fn work_key(record: &ProviderRecord) -> Option<WorkKey> {
    let title = record
        .document
        .titles
        .iter()
        .map(|t| t.title.trim())
        .find(|t| !t.is_empty())?;
    let venue = record
        .venue
        .as_ref()
        .and_then(|v| v.title.clone())
        .filter(|v| !v.trim().is_empty());
    Some(WorkKey::new(title, venue, record.document.year_published))
}

/// Staged records without a DOI, keyed for work-identity matching
#[derive(Debug, Default)]
pub struct CandidateIndex {
    keys: Vec<WorkKey>,
    records: Vec<RawRecord>,
}

impl CandidateIndex {
    pub async fn load(pool: &SqlitePool, normalizers: &NormalizerRegistry) -> Result<Self> {
        let records = db::load_raw_records_without_doi(pool).await?;
        let index = Self::from_records(records, normalizers);
        tracing::info!(candidates = index.len(), "Citation candidate index built");
        Ok(index)
    }

    /// Keep records whose normalizer yields a title; registry records are skipped
    pub fn from_records(records: Vec<RawRecord>, normalizers: &NormalizerRegistry) -> Self {
        let mut index = Self::default();

        for record in records {
            if record.provider.role() == ProviderRole::Registry {
                continue;
            }
            let Some(normalizer) = normalizers.get(record.provider) else {
                tracing::debug!(provider = %record.provider, "No normalizer; candidate skipped");
                continue;
            };
            match normalizer.parse(&record.body, 0) {
                Ok(parsed) => {
                    if let Some(key) = work_key(&parsed) {
                        index.keys.push(key);
                        index.records.push(record);
                    }
                }
                Err(e) => {
                    tracing::warn!(provider = %record.provider, id = record.id, error = %e, "Unparseable staged record");
                }
            }
        }
        index
    }

    /// First matching record per provider, in staging order
    pub fn find(&self, query: &WorkKey) -> Vec<RawRecord> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut offset = 0;

        while let Some(pos) = first_work_match(query, &self.keys[offset..]) {
            let idx = offset + pos;
            let record = &self.records[idx];
            if seen.insert(record.provider) {
                found.push(record.clone());
            }
            offset = idx + 1;
        }
        found
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
