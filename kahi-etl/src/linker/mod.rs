//! Identity linking of merged entities against the store
//!
//! Lookup order per entity, first hit wins:
//! - Work: external ids
//! - Author: external ids, then alias containment
//! - Institution: external ids, institution registry, exact alias, then
//!   the fuzzy name index
//! - Venue: external ids, then serial numbers
//!
//! A hit becomes a sparse patch written through `db::update_with`; a miss
//! inserts. Author, institution and venue ids are known before the work
//! that references them is written.

pub mod patch;

pub use patch::{AuthorPatch, ConflictPolicy, InstitutionPatch, VenuePatch, WorkPatch};

use crate::db;
use crate::enrichment::{InstitutionRegistry, RegistryItem};
use crate::index::InstitutionIndex;
use crate::merge::union_external_ids;
use crate::types::{Author, ExternalId, Institution, Venue, Work};
use kahi_common::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Registry id namespaces added to institutions on a registry hit
pub const ROR_SOURCE: &str = "ror";
pub const GRID_SOURCE: &str = "grid";

/// What linking did with one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Inserted(Uuid),
    Patched(Uuid),
    /// Matched a stored record that already had everything
    Unchanged(Uuid),
}

impl LinkOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            LinkOutcome::Inserted(id) | LinkOutcome::Patched(id) | LinkOutcome::Unchanged(id) => *id,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, LinkOutcome::Inserted(_))
    }
}

/// Links merged entities to stored canonical records
#[derive(Clone)]
pub struct Linker {
    pool: SqlitePool,
    registry: Option<Arc<dyn InstitutionRegistry>>,
    index: Arc<InstitutionIndex>,
    policy: ConflictPolicy,
    threshold: f64,
}

impl Linker {
    pub fn new(
        pool: SqlitePool,
        registry: Option<Arc<dyn InstitutionRegistry>>,
        index: Arc<InstitutionIndex>,
        policy: ConflictPolicy,
        threshold: f64,
    ) -> Self {
        Self {
            pool,
            registry,
            index,
            policy,
            threshold,
        }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    // ========================================================================
    // Works
    // ========================================================================

    pub async fn link_work(&self, fresh: Work, now: i64) -> Result<LinkOutcome> {
        match db::find_document_by_external_id(&self.pool, &fresh.external_ids).await? {
            Some((id, stored)) => {
                let patch = WorkPatch::compute(&stored, &fresh, self.policy);
                if patch.is_empty() {
                    return Ok(LinkOutcome::Unchanged(id));
                }
                db::update_with(&self.pool, id, |work: &mut Work| patch.apply(work, now)).await?;
                tracing::debug!(id = %id, "Patched stored work");
                Ok(LinkOutcome::Patched(id))
            }
            None => {
                let mut fresh = fresh;
                fresh.updated = now;
                let id = db::insert(&self.pool, &fresh).await?;
                Ok(LinkOutcome::Inserted(id))
            }
        }
    }

    // ========================================================================
    // Authors
    // ========================================================================

    /// Stored author sharing an external id or one of the fresh names
    pub async fn find_author(&self, fresh: &Author) -> Result<Option<(Uuid, Author)>> {
        if let Some(hit) = db::find_author_by_external_id(&self.pool, &fresh.external_ids).await? {
            tracing::debug!(name = %fresh.full_name, id = %hit.0, "Author matched by external id");
            return Ok(Some(hit));
        }

        let names = std::iter::once(fresh.full_name.as_str()).chain(fresh.aliases.iter());
        for name in names.filter(|n| !n.trim().is_empty()) {
            if let Some(hit) = db::find_author_by_alias(&self.pool, name).await? {
                tracing::debug!(name = %name, id = %hit.0, "Author matched by alias");
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    pub async fn link_author(&self, fresh: Author, now: i64) -> Result<LinkOutcome> {
        match self.find_author(&fresh).await? {
            Some((id, stored)) => {
                let patch = AuthorPatch::compute(&stored, &fresh, self.policy);
                if patch.is_empty() {
                    return Ok(LinkOutcome::Unchanged(id));
                }
                db::update_with(&self.pool, id, |author: &mut Author| patch.apply(author, now)).await?;
                Ok(LinkOutcome::Patched(id))
            }
            None => {
                let mut fresh = fresh;
                fresh.aliases.insert(&fresh.full_name);
                fresh.updated = now;
                Ok(LinkOutcome::Inserted(db::insert(&self.pool, &fresh).await?))
            }
        }
    }

    // ========================================================================
    // Institutions
    // ========================================================================

    /// Usable registry hit for a name; lookup failures count as no hit
    async fn registry_hit(&self, name: &str) -> Option<RegistryItem> {
        let registry = self.registry.as_ref()?;
        let response = match registry.lookup(name).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Institution registry lookup failed");
                return None;
            }
        };
        match response.usable_hit(self.threshold) {
            Ok(item) => Some(item.clone()),
            Err(e) => {
                tracing::debug!(name = %name, reason = %e, "No usable registry hit");
                None
            }
        }
    }

    async fn find_institution_by_registry_item(&self, item: &RegistryItem) -> Result<Option<(Uuid, Institution)>> {
        for value in item.preferred_id.iter().chain(std::iter::once(&item.id)) {
            if let Some(hit) = db::find_institution_by_external_id(&self.pool, value).await? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    /// Replace a superseded record by its redirect target, once
    async fn follow_redirect(&self, hit: (Uuid, Institution)) -> Result<(Uuid, Institution)> {
        let Some(target) = hit.1.redirect.clone().filter(|r| !r.trim().is_empty()) else {
            return Ok(hit);
        };
        match db::find_institution_by_external_id(&self.pool, &target).await? {
            Some(redirected) => {
                tracing::debug!(from = %hit.0, to = %redirected.0, "Following institution redirect");
                Ok(redirected)
            }
            None => {
                tracing::warn!(id = %hit.0, redirect = %target, "Institution redirect target not stored");
                Ok(hit)
            }
        }
    }

    /// Stored institution for a fresh one
    ///
    /// A usable registry hit also tags `fresh` with the registry ids so an
    /// insert carries them.
    pub async fn find_institution(&self, fresh: &mut Institution) -> Result<Option<(Uuid, Institution)>> {
        for id in &fresh.external_ids {
            if let Some(hit) = db::find_institution_by_external_id(&self.pool, &id.value).await? {
                return Ok(Some(self.follow_redirect(hit).await?));
            }
        }

        if let Some(item) = self.registry_hit(&fresh.name).await {
            let mut registry_ids = vec![ExternalId::new(ROR_SOURCE, item.id.as_str())];
            if let Some(grid) = &item.preferred_id {
                registry_ids.push(ExternalId::new(GRID_SOURCE, grid.as_str()));
            }
            union_external_ids(&mut fresh.external_ids, &registry_ids);

            if let Some(hit) = self.find_institution_by_registry_item(&item).await? {
                tracing::debug!(name = %fresh.name, id = %hit.0, score = item.score, "Institution matched through registry");
                return Ok(Some(self.follow_redirect(hit).await?));
            }
        }

        if let Some(hit) = db::find_institution_by_alias(&self.pool, &fresh.name).await? {
            return Ok(Some(self.follow_redirect(hit).await?));
        }

        if let Some(candidate) = self.index.find(&fresh.name) {
            if let Some(stored) = db::load::<Institution>(&self.pool, candidate.candidate).await? {
                tracing::debug!(
                    name = %fresh.name,
                    id = %candidate.candidate,
                    score = candidate.score,
                    stage = candidate.matched_on,
                    "Institution matched by name index"
                );
                return Ok(Some(self.follow_redirect((candidate.candidate, stored)).await?));
            }
        }

        Ok(None)
    }

    pub async fn link_institution(&self, fresh: Institution, now: i64) -> Result<LinkOutcome> {
        let mut fresh = fresh;
        match self.find_institution(&mut fresh).await? {
            Some((id, stored)) => {
                let patch = InstitutionPatch::compute(&stored, &fresh);
                if patch.is_empty() {
                    return Ok(LinkOutcome::Unchanged(id));
                }
                db::update_with(&self.pool, id, |institution: &mut Institution| patch.apply(institution, now))
                    .await?;
                Ok(LinkOutcome::Patched(id))
            }
            None => {
                fresh.aliases.insert(&fresh.name);
                fresh.updated = now;
                Ok(LinkOutcome::Inserted(db::insert(&self.pool, &fresh).await?))
            }
        }
    }

    /// Resolve an institution name to a stored id without inserting
    pub async fn resolve_institution_name(&self, name: &str) -> Result<Option<Uuid>> {
        let mut query = Institution {
            name: name.trim().to_string(),
            ..Default::default()
        };
        if query.name.is_empty() {
            return Ok(None);
        }
        Ok(self.find_institution(&mut query).await?.map(|(id, _)| id))
    }

    // ========================================================================
    // Venues
    // ========================================================================

    pub async fn find_venue(&self, fresh: &Venue) -> Result<Option<(Uuid, Venue)>> {
        if let Some(hit) = db::find_source_by_external_id(&self.pool, &fresh.external_ids).await? {
            return Ok(Some(hit));
        }
        for serial in &fresh.serials {
            if let Some(hit) = db::find_source_by_serial(&self.pool, &serial.value).await? {
                tracing::debug!(serial = %serial.value, id = %hit.0, "Venue matched by serial");
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    pub async fn link_venue(&self, fresh: Venue, now: i64) -> Result<LinkOutcome> {
        let mut fresh = fresh;
        let found = self.find_venue(&fresh).await?;

        // the publishing institution, when named but not yet linked
        let stored_link = found.as_ref().and_then(|(_, v)| v.institution_id);
        if fresh.institution_id.is_none() && stored_link.is_none() {
            let name = found
                .as_ref()
                .and_then(|(_, v)| v.institution.clone())
                .or_else(|| fresh.institution.clone());
            if let Some(name) = name {
                fresh.institution_id = self.resolve_institution_name(&name).await?;
                if fresh.institution.is_none() {
                    fresh.institution = Some(name);
                }
            }
        }

        match found {
            Some((id, stored)) => {
                let patch = VenuePatch::compute(&stored, &fresh, self.policy);
                if patch.is_empty() {
                    return Ok(LinkOutcome::Unchanged(id));
                }
                db::update_with(&self.pool, id, |venue: &mut Venue| patch.apply(venue, now)).await?;
                Ok(LinkOutcome::Patched(id))
            }
            None => {
                fresh.updated = now;
                Ok(LinkOutcome::Inserted(db::insert(&self.pool, &fresh).await?))
            }
        }
    }
}
