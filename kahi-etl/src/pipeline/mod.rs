//! Per-identifier pipeline: normalize → merge → link → persist
//!
//! A `Pipeline` is cheap to clone; every worker gets its own. The store is
//! the only mutable thing they share.

pub mod orchestrator;
pub mod report;
pub mod source;

pub use orchestrator::Orchestrator;
pub use report::{BatchReport, Outcome, ReportEntry};
pub use source::{RawRecordSource, StagedRecordSource};

use crate::config::{EtlConfig, OaRegistryMode};
use crate::db::{self, RawRecord};
use crate::enrichment::{
    CurrencyConverter, DoajClient, FixedRateConverter, HttpCurrencyConverter, InstitutionRegistry,
    OpenAccessRegistry, RorClient, StagedOpenAccessRegistry,
};
use crate::error::{ProcessError, SkipReason};
use crate::index::{CandidateIndex, InstitutionIndex};
use crate::linker::Linker;
use crate::merge::{
    enrich_venue, merge_documents, merge_venues, resolve_authors, union_external_ids, UnmatchedAuthorPolicy,
    VenueEnrichment,
};
use crate::normalizer::NormalizerRegistry;
use crate::similarity::WorkKey;
use crate::types::{AuthorRef, ExternalId, ProviderRecord, ResolvedAuthor, WorkIdentifier};
use kahi_common::{time, Error};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// External id source of the key a citation-identified work is stored under
pub const CITATION_SOURCE: &str = "citation";

/// Store key for a citation identifier; `None` for DOIs
pub fn citation_id(identifier: &WorkIdentifier) -> Option<ExternalId> {
    match identifier {
        WorkIdentifier::Doi(_) => None,
        WorkIdentifier::Citation { title, venue, year } => Some(ExternalId::new(
            CITATION_SOURCE,
            WorkKey::new(title.as_str(), venue.clone(), *year).fingerprint(),
        )),
    }
}

#[derive(Clone)]
pub struct Pipeline {
    pool: SqlitePool,
    source: Arc<dyn RawRecordSource>,
    normalizers: Arc<NormalizerRegistry>,
    linker: Linker,
    enrichment: VenueEnrichment,
    unmatched_authors: UnmatchedAuthorPolicy,
}

impl Pipeline {
    pub fn new(
        pool: SqlitePool,
        source: Arc<dyn RawRecordSource>,
        normalizers: Arc<NormalizerRegistry>,
        linker: Linker,
        enrichment: VenueEnrichment,
        unmatched_authors: UnmatchedAuthorPolicy,
    ) -> Self {
        Self {
            pool,
            source,
            normalizers,
            linker,
            enrichment,
            unmatched_authors,
        }
    }

    /// Wire a pipeline from resolved settings
    ///
    /// Builds the read-only indexes once; clones of the result share them.
    pub async fn from_config(config: &EtlConfig, pool: SqlitePool) -> kahi_common::Result<Self> {
        let normalizers = Arc::new(NormalizerRegistry::with_defaults());
        let institutions = Arc::new(InstitutionIndex::load(&pool).await?);
        let candidates = Arc::new(CandidateIndex::load(&pool, &normalizers).await?);
        let client_error = |e: crate::error::EnrichmentError| Error::Config(format!("HTTP client: {}", e));

        let (registry, enrichment) = if config.enrichment {
            let registry: Arc<dyn InstitutionRegistry> =
                Arc::new(RorClient::new(&config.ror_url, config.http_timeout).map_err(client_error)?);
            let oa: Arc<dyn OpenAccessRegistry> = match config.oa_registry {
                OaRegistryMode::Staged => Arc::new(StagedOpenAccessRegistry::new(pool.clone())),
                OaRegistryMode::Live => {
                    Arc::new(DoajClient::new(&config.doaj_url, config.http_timeout).map_err(client_error)?)
                }
            };
            let currency: Arc<dyn CurrencyConverter> = if config.usd_rates.is_empty() {
                Arc::new(HttpCurrencyConverter::new(&config.currency_url, config.http_timeout).map_err(client_error)?)
            } else {
                Arc::new(FixedRateConverter::new(config.usd_rates.iter().map(|(k, v)| (k, *v))))
            };
            (Some(registry), VenueEnrichment::new(oa, Some(currency)))
        } else {
            tracing::info!("Network enrichment disabled");
            (None, VenueEnrichment::disabled())
        };

        let linker = Linker::new(
            pool.clone(),
            registry,
            institutions,
            config.conflict_policy,
            config.registry_score_threshold,
        );
        let source = Arc::new(StagedRecordSource::new(pool.clone(), candidates));

        Ok(Self::new(
            pool,
            source,
            normalizers,
            linker,
            enrichment,
            config.unmatched_author_policy,
        ))
    }

    /// Process one work identifier
    ///
    /// Returns the id of the inserted work. An identifier already stored
    /// (by DOI, or by citation key) is skipped before any provider data is
    /// read; one whose merged work links to a stored work is skipped after
    /// that work is patched.
    pub async fn process(&self, identifier: &WorkIdentifier) -> Result<Uuid, ProcessError> {
        self.check_identifier(identifier).await?;

        let raw = self.source.fetch(identifier).await?;
        let now = time::now_ts();
        let records = self.normalize(raw, now)?;
        if records.is_empty() {
            return Err(ProcessError::Skipped(SkipReason::NoProviderData));
        }

        let mut work = merge_documents(&records);

        if let Some(key) = citation_id(identifier) {
            // a citation lookup can surface a DOI that is already stored
            if let Some((id, _)) = db::find_document_by_external_id(&self.pool, &work.external_ids).await? {
                return Err(ProcessError::Skipped(SkipReason::AlreadyPresent { id }));
            }
            union_external_ids(&mut work.external_ids, std::iter::once(&key));
        }

        let authors = resolve_authors(&records, self.unmatched_authors);
        let venue = match merge_venues(&records) {
            Some(mut venue) => {
                enrich_venue(&mut venue, &self.enrichment, now).await;
                Some(venue)
            }
            None => None,
        };

        if let Some(venue) = venue {
            work.venue_id = Some(self.linker.link_venue(venue, now).await?.id());
        }
        for resolved in authors {
            work.authors.push(self.link_author(resolved, now).await?);
        }
        work.updated = now;

        let outcome = self.linker.link_work(work, now).await?;
        if !outcome.is_insert() {
            // shares an id with a stored work, or another worker stored it first
            tracing::info!(identifier = %identifier, id = %outcome.id(), "Work already stored; linked instead of inserted");
            return Err(ProcessError::Skipped(SkipReason::AlreadyPresent { id: outcome.id() }));
        }

        tracing::info!(
            identifier = %identifier,
            id = %outcome.id(),
            providers = records.len(),
            "Work processed"
        );
        Ok(outcome.id())
    }

    async fn check_identifier(&self, identifier: &WorkIdentifier) -> Result<(), ProcessError> {
        match identifier {
            WorkIdentifier::Doi(doi) => {
                if doi.trim().is_empty() {
                    return Err(ProcessError::Skipped(SkipReason::InvalidIdentifier));
                }
                let ids = [ExternalId::doi(doi)];
                if let Some((id, _)) = db::find_document_by_external_id(&self.pool, &ids).await? {
                    tracing::debug!(doi = %doi, id = %id, "DOI already stored");
                    return Err(ProcessError::Skipped(SkipReason::AlreadyPresent { id }));
                }
                Ok(())
            }
            WorkIdentifier::Citation { title, .. } => {
                if title.trim().is_empty() {
                    return Err(ProcessError::Skipped(SkipReason::InvalidIdentifier));
                }
                if let Some(key) = citation_id(identifier) {
                    if let Some((id, _)) = db::find_document_by_external_id(&self.pool, &[key]).await? {
                        tracing::debug!(identifier = %identifier, id = %id, "Citation already stored");
                        return Err(ProcessError::Skipped(SkipReason::AlreadyPresent { id }));
                    }
                }
                Ok(())
            }
        }
    }

    /// Parse raw records; malformed ones are dropped
    fn normalize(&self, raw: Vec<RawRecord>, checked_at: i64) -> Result<Vec<ProviderRecord>, ProcessError> {
        let mut records = Vec::with_capacity(raw.len());
        for record in raw {
            let normalizer = self
                .normalizers
                .get(record.provider)
                .ok_or(ProcessError::MissingNormalizer(record.provider))?;
            match normalizer.parse(&record.body, checked_at) {
                Ok(parsed) => records.push(parsed),
                Err(e) => {
                    tracing::warn!(
                        provider = %record.provider,
                        raw_id = record.id,
                        error = %e,
                        "Malformed provider record; fragment ignored"
                    );
                }
            }
        }
        Ok(records)
    }

    /// Link an author's affiliations, then the author
    async fn link_author(&self, resolved: ResolvedAuthor, now: i64) -> Result<AuthorRef, ProcessError> {
        let mut affiliations = Vec::with_capacity(resolved.affiliations.len());
        for institution in resolved.affiliations {
            let id = self.linker.link_institution(institution, now).await?.id();
            if !affiliations.contains(&id) {
                affiliations.push(id);
            }
        }

        let mut author = resolved.author;
        for id in &affiliations {
            if !author.affiliations.contains(id) {
                author.affiliations.push(*id);
            }
        }
        let author_id = self.linker.link_author(author, now).await?.id();

        Ok(AuthorRef {
            author_id,
            affiliations,
            is_corresponding: resolved.is_corresponding,
            corresponding_email: resolved.corresponding_email,
            corresponding_address: resolved.corresponding_address,
        })
    }
}
