//! Stub collaborators for the async enrichment traits

use async_trait::async_trait;
use kahi_etl::enrichment::{
    CurrencyConverter, FixedRateConverter, InstitutionRegistry, OpenAccessJournal, OpenAccessRegistry,
    RegistryItem, RegistryResponse,
};
use kahi_etl::error::EnrichmentError;
use kahi_etl::index::{CandidateIndex, InstitutionIndex};
use kahi_etl::linker::{ConflictPolicy, Linker};
use kahi_etl::merge::{UnmatchedAuthorPolicy, VenueEnrichment};
use kahi_etl::normalizer::NormalizerRegistry;
use kahi_etl::pipeline::{Pipeline, StagedRecordSource};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Registry answering every name with the same organization
pub struct FixedRegistry {
    pub item: RegistryItem,
    pub calls: AtomicUsize,
}

impl FixedRegistry {
    pub fn new(id: &str, grid: Option<&str>, score: f64) -> Self {
        Self {
            item: RegistryItem {
                score,
                id: id.to_string(),
                preferred_id: grid.map(String::from),
                name: None,
            },
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InstitutionRegistry for FixedRegistry {
    async fn lookup(&self, _name: &str) -> Result<RegistryResponse, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(RegistryResponse {
            count: 1,
            items: vec![self.item.clone()],
        })
    }
}

/// Registry whose every lookup fails
pub struct FailingRegistry;

#[async_trait]
impl InstitutionRegistry for FailingRegistry {
    async fn lookup(&self, _name: &str) -> Result<RegistryResponse, EnrichmentError> {
        Err(EnrichmentError::Status(503))
    }
}

/// Open-access registry over an in-memory ISSN table
#[derive(Default)]
pub struct MapOpenAccessRegistry {
    journals: HashMap<String, OpenAccessJournal>,
}

impl MapOpenAccessRegistry {
    pub fn with(mut self, issn: &str, journal: OpenAccessJournal) -> Self {
        self.journals.insert(issn.to_string(), journal);
        self
    }
}

#[async_trait]
impl OpenAccessRegistry for MapOpenAccessRegistry {
    async fn lookup_issn(&self, issn: &str) -> Result<OpenAccessJournal, EnrichmentError> {
        self.journals
            .get(issn)
            .cloned()
            .ok_or_else(|| EnrichmentError::NotFound(format!("ISSN {}", issn)))
    }
}

/// Pipeline over the staging table with swappable collaborators
pub struct TablePipelineBuilder {
    pool: SqlitePool,
    registry: Option<Arc<dyn InstitutionRegistry>>,
    oa: Option<Arc<dyn OpenAccessRegistry>>,
    currency: Option<Arc<dyn CurrencyConverter>>,
    policy: ConflictPolicy,
    unmatched: UnmatchedAuthorPolicy,
}

impl TablePipelineBuilder {
    pub fn new(pool: &SqlitePool) -> Self {
        Self {
            pool: pool.clone(),
            registry: None,
            oa: None,
            currency: None,
            policy: ConflictPolicy::StoredWins,
            unmatched: UnmatchedAuthorPolicy::Exclude,
        }
    }

    pub fn registry(mut self, registry: Arc<dyn InstitutionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn open_access(mut self, oa: Arc<dyn OpenAccessRegistry>) -> Self {
        self.oa = Some(oa);
        self
    }

    pub fn usd_rates(mut self, rates: &[(&str, f64)]) -> Self {
        self.currency = Some(Arc::new(FixedRateConverter::new(rates.iter().copied())));
        self
    }

    pub fn unmatched_authors(mut self, policy: UnmatchedAuthorPolicy) -> Self {
        self.unmatched = policy;
        self
    }

    /// Build, loading the read-only indexes from the current store
    pub async fn build(self) -> Pipeline {
        let normalizers = Arc::new(NormalizerRegistry::with_defaults());
        let institutions = Arc::new(InstitutionIndex::load(&self.pool).await.unwrap());
        let candidates = Arc::new(CandidateIndex::load(&self.pool, &normalizers).await.unwrap());

        let enrichment = match self.oa {
            Some(oa) => VenueEnrichment::new(oa, self.currency),
            None => VenueEnrichment::disabled(),
        };
        let linker = Linker::new(self.pool.clone(), self.registry, institutions, self.policy, 0.8);
        let source = Arc::new(StagedRecordSource::new(self.pool.clone(), candidates));

        Pipeline::new(self.pool, source, normalizers, linker, enrichment, self.unmatched)
    }
}
