//! Sparse patches of stored canonical records
//!
//! A patch carries the scalar fields that are blank in the stored record
//! and set in the fresh one, plus the items the append-only lists are
//! missing. Applying re-checks blankness against the record as read inside
//! the write transaction, so a field filled by another worker in between is
//! left alone.

use crate::merge::venue::{union_abbreviations, union_serials};
use crate::merge::{union_external_ids, union_source_checked, union_strings};
use crate::types::{
    non_blank, Abbreviation, Address, Author, ExternalId, Institution, Serial, SourceChecked,
    Title, Venue, Work,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// How a fresh scalar that differs from a non-blank stored one is handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the stored value
    #[default]
    StoredWins,
    /// Take the fresh value when its provenance is newer than the stored one
    MostRecentlyChecked,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stored_wins" | "stored-wins" => Ok(Self::StoredWins),
            "most_recently_checked" | "most-recently-checked" => Ok(Self::MostRecentlyChecked),
            other => Err(format!("Unknown conflict policy: {}", other)),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoredWins => f.write_str("stored_wins"),
            Self::MostRecentlyChecked => f.write_str("most_recently_checked"),
        }
    }
}

fn latest(checked: &[SourceChecked]) -> Option<i64> {
    checked.iter().map(|c| c.ts).max()
}

impl ConflictPolicy {
    /// Whether fresh scalars may replace non-blank stored ones
    pub fn overwrites(&self, stored: &[SourceChecked], fresh: &[SourceChecked]) -> bool {
        match self {
            Self::StoredWins => false,
            Self::MostRecentlyChecked => match (latest(stored), latest(fresh)) {
                (Some(s), Some(f)) => f > s,
                (None, Some(_)) => true,
                _ => false,
            },
        }
    }
}

// ============================================================================
// Field helpers
// ============================================================================

fn is_blank(value: &Option<String>) -> bool {
    non_blank(value).is_none()
}

/// Fresh text if it fills a blank (or may overwrite a different value)
fn text_fill(stored: &Option<String>, fresh: &Option<String>, overwrite: bool) -> Option<String> {
    let fresh = non_blank(fresh)?;
    match non_blank(stored) {
        None => Some(fresh.to_string()),
        Some(current) if overwrite && current != fresh => Some(fresh.to_string()),
        Some(_) => None,
    }
}

fn value_fill<T: Clone + PartialEq>(stored: &Option<T>, fresh: &Option<T>, overwrite: bool) -> Option<T> {
    let fresh = fresh.as_ref()?;
    match stored {
        None => Some(fresh.clone()),
        Some(current) if overwrite && current != fresh => Some(fresh.clone()),
        Some(_) => None,
    }
}

fn set_text(slot: &mut Option<String>, value: &Option<String>, overwrite: bool) {
    if let Some(v) = value {
        if is_blank(slot) || overwrite {
            *slot = Some(v.clone());
        }
    }
}

fn set_value<T: Clone>(slot: &mut Option<T>, value: &Option<T>, overwrite: bool) {
    if let Some(v) = value {
        if slot.is_none() || overwrite {
            *slot = Some(v.clone());
        }
    }
}

fn missing_strings(stored: &[String], fresh: &[String]) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for value in fresh.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        let known = stored
            .iter()
            .chain(missing.iter())
            .any(|s| s.eq_ignore_ascii_case(value));
        if !known {
            missing.push(value.to_string());
        }
    }
    missing
}

fn missing_items<T: Clone + PartialEq>(stored: &[T], fresh: &[T]) -> Vec<T> {
    let mut missing: Vec<T> = Vec::new();
    for item in fresh {
        if !stored.contains(item) && !missing.contains(item) {
            missing.push(item.clone());
        }
    }
    missing
}

fn missing_ids(stored: &[ExternalId], fresh: &[ExternalId]) -> Vec<ExternalId> {
    let mut merged = stored.to_vec();
    union_external_ids(&mut merged, fresh);
    merged.split_off(stored.len())
}

fn missing_aliases<'a>(stored: &crate::types::AliasSet, fresh: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut merged = stored.clone();
    fresh
        .into_iter()
        .filter(|name| merged.insert(name))
        .map(|name| name.trim().to_string())
        .collect()
}

// ============================================================================
// Work
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkPatch {
    pub overwrite: bool,
    pub abstract_text: Option<String>,
    pub publication_type: Option<String>,
    pub start_page: Option<String>,
    pub end_page: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub year_published: Option<i32>,
    pub date_published: Option<i64>,
    pub funding_organization: Option<String>,
    pub funding_details: Option<String>,
    pub references_count: Option<u32>,
    pub citations_count: Option<u32>,
    pub citations_link: Option<String>,
    pub is_open_access: Option<bool>,
    pub open_access_status: Option<String>,
    pub bibtex: Option<String>,
    pub venue_id: Option<Uuid>,
    /// Author list, only when the stored work has none
    pub authors: Option<Vec<crate::types::AuthorRef>>,
    pub add_titles: Vec<Title>,
    pub add_external_ids: Vec<ExternalId>,
    pub add_languages: Vec<String>,
    pub add_keywords: Vec<String>,
    pub add_subjects: Vec<String>,
    pub add_urls: Vec<String>,
    pub add_source_checked: Vec<SourceChecked>,
}

impl WorkPatch {
    pub fn compute(stored: &Work, fresh: &Work, policy: ConflictPolicy) -> Self {
        let overwrite = policy.overwrites(&stored.source_checked, &fresh.source_checked);
        Self {
            overwrite,
            abstract_text: text_fill(&stored.abstract_text, &fresh.abstract_text, overwrite),
            publication_type: text_fill(&stored.publication_type, &fresh.publication_type, overwrite),
            start_page: text_fill(&stored.start_page, &fresh.start_page, overwrite),
            end_page: text_fill(&stored.end_page, &fresh.end_page, overwrite),
            volume: text_fill(&stored.volume, &fresh.volume, overwrite),
            issue: text_fill(&stored.issue, &fresh.issue, overwrite),
            year_published: value_fill(&stored.year_published, &fresh.year_published, overwrite),
            date_published: value_fill(&stored.date_published, &fresh.date_published, overwrite),
            funding_organization: text_fill(&stored.funding_organization, &fresh.funding_organization, overwrite),
            funding_details: text_fill(&stored.funding_details, &fresh.funding_details, overwrite),
            references_count: value_fill(&stored.references_count, &fresh.references_count, overwrite),
            citations_count: value_fill(&stored.citations_count, &fresh.citations_count, overwrite),
            citations_link: text_fill(&stored.citations_link, &fresh.citations_link, overwrite),
            is_open_access: value_fill(&stored.is_open_access, &fresh.is_open_access, overwrite),
            open_access_status: text_fill(&stored.open_access_status, &fresh.open_access_status, overwrite),
            bibtex: text_fill(&stored.bibtex, &fresh.bibtex, overwrite),
            venue_id: value_fill(&stored.venue_id, &fresh.venue_id, false),
            authors: (stored.authors.is_empty() && !fresh.authors.is_empty()).then(|| fresh.authors.clone()),
            add_titles: fresh
                .titles
                .iter()
                .filter(|t| !stored.titles.iter().any(|s| s.lang == t.lang))
                .cloned()
                .collect(),
            add_external_ids: missing_ids(&stored.external_ids, &fresh.external_ids),
            add_languages: missing_strings(&stored.languages, &fresh.languages),
            add_keywords: missing_strings(&stored.keywords, &fresh.keywords),
            add_subjects: missing_strings(&stored.subjects, &fresh.subjects),
            add_urls: missing_strings(&stored.urls, &fresh.urls),
            add_source_checked: missing_items(&stored.source_checked, &fresh.source_checked),
        }
    }

    pub fn is_empty(&self) -> bool {
        let unchanged = WorkPatch {
            overwrite: self.overwrite,
            ..Default::default()
        };
        *self == unchanged
    }

    pub fn apply(&self, work: &mut Work, now: i64) {
        let o = self.overwrite;
        set_text(&mut work.abstract_text, &self.abstract_text, o);
        work.abstract_idx = work.abstract_text.as_ref().map(|a| a.to_lowercase());
        set_text(&mut work.publication_type, &self.publication_type, o);
        set_text(&mut work.start_page, &self.start_page, o);
        set_text(&mut work.end_page, &self.end_page, o);
        set_text(&mut work.volume, &self.volume, o);
        set_text(&mut work.issue, &self.issue, o);
        set_value(&mut work.year_published, &self.year_published, o);
        set_value(&mut work.date_published, &self.date_published, o);
        set_text(&mut work.funding_organization, &self.funding_organization, o);
        set_text(&mut work.funding_details, &self.funding_details, o);
        set_value(&mut work.references_count, &self.references_count, o);
        set_value(&mut work.citations_count, &self.citations_count, o);
        set_text(&mut work.citations_link, &self.citations_link, o);
        set_value(&mut work.is_open_access, &self.is_open_access, o);
        set_text(&mut work.open_access_status, &self.open_access_status, o);
        set_text(&mut work.bibtex, &self.bibtex, o);
        set_value(&mut work.venue_id, &self.venue_id, false);
        if let Some(authors) = &self.authors {
            if work.authors.is_empty() {
                work.authors = authors.clone();
            }
        }
        for title in &self.add_titles {
            if !work.titles.iter().any(|t| t.lang == title.lang) {
                work.titles.push(title.clone());
            }
        }
        union_external_ids(&mut work.external_ids, &self.add_external_ids);
        union_strings(&mut work.languages, &self.add_languages);
        union_strings(&mut work.keywords, &self.add_keywords);
        union_strings(&mut work.subjects, &self.add_subjects);
        union_strings(&mut work.urls, &self.add_urls);
        union_source_checked(&mut work.source_checked, &self.add_source_checked);
        work.updated = now;
    }
}

// ============================================================================
// Author
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorPatch {
    pub overwrite: bool,
    pub full_name: Option<String>,
    pub first_names: Option<String>,
    pub last_names: Option<String>,
    pub initials: Option<String>,
    pub add_aliases: Vec<String>,
    pub add_external_ids: Vec<ExternalId>,
    pub add_keywords: Vec<String>,
    pub add_affiliations: Vec<Uuid>,
    pub add_source_checked: Vec<SourceChecked>,
}

impl AuthorPatch {
    pub fn compute(stored: &Author, fresh: &Author, policy: ConflictPolicy) -> Self {
        let overwrite = policy.overwrites(&stored.source_checked, &fresh.source_checked);
        let stored_name = Some(stored.full_name.clone());
        let fresh_name = Some(fresh.full_name.clone());
        Self {
            overwrite,
            // the name is the alias anchor, never replaced
            full_name: text_fill(&stored_name, &fresh_name, false),
            first_names: text_fill(&stored.first_names, &fresh.first_names, overwrite),
            last_names: text_fill(&stored.last_names, &fresh.last_names, overwrite),
            initials: text_fill(&stored.initials, &fresh.initials, overwrite),
            add_aliases: missing_aliases(
                &stored.aliases,
                std::iter::once(fresh.full_name.as_str()).chain(fresh.aliases.iter()),
            ),
            add_external_ids: missing_ids(&stored.external_ids, &fresh.external_ids),
            add_keywords: missing_strings(&stored.keywords, &fresh.keywords),
            add_affiliations: missing_items(&stored.affiliations, &fresh.affiliations),
            add_source_checked: missing_items(&stored.source_checked, &fresh.source_checked),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self
            == AuthorPatch {
                overwrite: self.overwrite,
                ..Default::default()
            }
    }

    pub fn apply(&self, author: &mut Author, now: i64) {
        let o = self.overwrite;
        if let Some(name) = &self.full_name {
            if author.full_name.trim().is_empty() {
                author.full_name = name.clone();
            }
        }
        set_text(&mut author.first_names, &self.first_names, o);
        set_text(&mut author.last_names, &self.last_names, o);
        set_text(&mut author.initials, &self.initials, o);
        author.aliases.extend(self.add_aliases.iter().map(String::as_str));
        union_external_ids(&mut author.external_ids, &self.add_external_ids);
        union_strings(&mut author.keywords, &self.add_keywords);
        for id in &self.add_affiliations {
            if !author.affiliations.contains(id) {
                author.affiliations.push(*id);
            }
        }
        union_source_checked(&mut author.source_checked, &self.add_source_checked);
        author.updated = now;
    }
}

// ============================================================================
// Institution
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstitutionPatch {
    pub name: Option<String>,
    pub add_aliases: Vec<String>,
    pub add_abbreviations: Vec<String>,
    pub add_types: Vec<String>,
    pub add_addresses: Vec<Address>,
    pub add_external_ids: Vec<ExternalId>,
    pub add_external_urls: Vec<String>,
    pub add_source_checked: Vec<SourceChecked>,
}

impl InstitutionPatch {
    /// Institutions carry no conflicting scalars beyond the name, which is
    /// only ever filled
    pub fn compute(stored: &Institution, fresh: &Institution) -> Self {
        let stored_name = Some(stored.name.clone());
        let fresh_name = Some(fresh.name.clone());
        Self {
            name: text_fill(&stored_name, &fresh_name, false),
            add_aliases: missing_aliases(
                &stored.aliases,
                std::iter::once(fresh.name.as_str()).chain(fresh.aliases.iter()),
            ),
            add_abbreviations: missing_strings(&stored.abbreviations, &fresh.abbreviations),
            add_types: missing_strings(&stored.types, &fresh.types),
            add_addresses: missing_items(&stored.addresses, &fresh.addresses),
            add_external_ids: missing_ids(&stored.external_ids, &fresh.external_ids),
            add_external_urls: missing_strings(&stored.external_urls, &fresh.external_urls),
            add_source_checked: missing_items(&stored.source_checked, &fresh.source_checked),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == InstitutionPatch::default()
    }

    pub fn apply(&self, institution: &mut Institution, now: i64) {
        if let Some(name) = &self.name {
            if institution.name.trim().is_empty() {
                institution.name = name.clone();
            }
        }
        institution.aliases.extend(self.add_aliases.iter().map(String::as_str));
        union_strings(&mut institution.abbreviations, &self.add_abbreviations);
        union_strings(&mut institution.types, &self.add_types);
        for address in &self.add_addresses {
            if !institution.addresses.contains(address) {
                institution.addresses.push(address.clone());
            }
        }
        union_external_ids(&mut institution.external_ids, &self.add_external_ids);
        union_strings(&mut institution.external_urls, &self.add_external_urls);
        union_source_checked(&mut institution.source_checked, &self.add_source_checked);
        institution.updated = now;
    }
}

// ============================================================================
// Venue
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VenuePatch {
    pub overwrite: bool,
    pub title: Option<String>,
    pub publication_type: Option<String>,
    pub publisher: Option<String>,
    pub country: Option<String>,
    pub institution: Option<String>,
    pub institution_id: Option<Uuid>,
    pub editorial_review: Option<String>,
    pub plagiarism_detection: Option<bool>,
    pub active: Option<bool>,
    pub publication_time: Option<u32>,
    pub submission_charges: Option<f64>,
    pub submission_currency: Option<String>,
    pub submission_charges_usd: Option<f64>,
    pub apc_charges: Option<f64>,
    pub apc_currency: Option<String>,
    pub apc_charges_usd: Option<f64>,
    pub add_serials: Vec<Serial>,
    pub add_abbreviations: Vec<Abbreviation>,
    pub add_aliases: Vec<String>,
    pub add_external_ids: Vec<ExternalId>,
    pub add_external_urls: Vec<String>,
    pub add_subjects: Vec<String>,
    pub add_keywords: Vec<String>,
    pub add_languages: Vec<String>,
    pub add_license: Vec<String>,
    pub add_source_checked: Vec<SourceChecked>,
}

/// Fresh serials that add a value or a type to the stored set
fn serial_changes(stored: &[Serial], fresh: &[Serial]) -> Vec<Serial> {
    fresh
        .iter()
        .filter(|serial| {
            let mut merged = stored.to_vec();
            union_serials(&mut merged, std::iter::once(*serial));
            merged != stored
        })
        .cloned()
        .collect()
}

impl VenuePatch {
    pub fn compute(stored: &Venue, fresh: &Venue, policy: ConflictPolicy) -> Self {
        let overwrite = policy.overwrites(&stored.source_checked, &fresh.source_checked);
        let mut abbreviations = stored.abbreviations.clone();
        union_abbreviations(&mut abbreviations, &fresh.abbreviations);

        Self {
            overwrite,
            title: text_fill(&stored.title, &fresh.title, overwrite),
            publication_type: text_fill(&stored.publication_type, &fresh.publication_type, overwrite),
            publisher: text_fill(&stored.publisher, &fresh.publisher, overwrite),
            country: text_fill(&stored.country, &fresh.country, overwrite),
            institution: text_fill(&stored.institution, &fresh.institution, overwrite),
            institution_id: value_fill(&stored.institution_id, &fresh.institution_id, overwrite),
            editorial_review: text_fill(&stored.editorial_review, &fresh.editorial_review, overwrite),
            plagiarism_detection: value_fill(&stored.plagiarism_detection, &fresh.plagiarism_detection, overwrite),
            active: value_fill(&stored.active, &fresh.active, overwrite),
            publication_time: value_fill(&stored.publication_time, &fresh.publication_time, overwrite),
            submission_charges: value_fill(&stored.submission_charges, &fresh.submission_charges, overwrite),
            submission_currency: text_fill(&stored.submission_currency, &fresh.submission_currency, overwrite),
            submission_charges_usd: value_fill(&stored.submission_charges_usd, &fresh.submission_charges_usd, overwrite),
            apc_charges: value_fill(&stored.apc_charges, &fresh.apc_charges, overwrite),
            apc_currency: text_fill(&stored.apc_currency, &fresh.apc_currency, overwrite),
            apc_charges_usd: value_fill(&stored.apc_charges_usd, &fresh.apc_charges_usd, overwrite),
            add_serials: serial_changes(&stored.serials, &fresh.serials),
            add_abbreviations: abbreviations.split_off(stored.abbreviations.len()),
            add_aliases: missing_strings(&stored.aliases, &fresh.aliases),
            add_external_ids: missing_ids(&stored.external_ids, &fresh.external_ids),
            add_external_urls: missing_strings(&stored.external_urls, &fresh.external_urls),
            add_subjects: missing_strings(&stored.subjects, &fresh.subjects),
            add_keywords: missing_strings(&stored.keywords, &fresh.keywords),
            add_languages: missing_strings(&stored.languages, &fresh.languages),
            add_license: missing_strings(&stored.license, &fresh.license),
            add_source_checked: missing_items(&stored.source_checked, &fresh.source_checked),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self
            == VenuePatch {
                overwrite: self.overwrite,
                ..Default::default()
            }
    }

    pub fn apply(&self, venue: &mut Venue, now: i64) {
        let o = self.overwrite;
        set_text(&mut venue.title, &self.title, o);
        venue.title_idx = venue.title.as_ref().map(|t| t.to_lowercase());
        set_text(&mut venue.publication_type, &self.publication_type, o);
        set_text(&mut venue.publisher, &self.publisher, o);
        venue.publisher_idx = venue.publisher.as_ref().map(|p| p.to_lowercase());
        set_text(&mut venue.country, &self.country, o);
        set_text(&mut venue.institution, &self.institution, o);
        set_value(&mut venue.institution_id, &self.institution_id, o);
        set_text(&mut venue.editorial_review, &self.editorial_review, o);
        set_value(&mut venue.plagiarism_detection, &self.plagiarism_detection, o);
        set_value(&mut venue.active, &self.active, o);
        set_value(&mut venue.publication_time, &self.publication_time, o);
        set_value(&mut venue.submission_charges, &self.submission_charges, o);
        set_text(&mut venue.submission_currency, &self.submission_currency, o);
        set_value(&mut venue.submission_charges_usd, &self.submission_charges_usd, o);
        set_value(&mut venue.apc_charges, &self.apc_charges, o);
        set_text(&mut venue.apc_currency, &self.apc_currency, o);
        set_value(&mut venue.apc_charges_usd, &self.apc_charges_usd, o);
        union_serials(&mut venue.serials, &self.add_serials);
        union_abbreviations(&mut venue.abbreviations, &self.add_abbreviations);
        union_strings(&mut venue.aliases, &self.add_aliases);
        union_external_ids(&mut venue.external_ids, &self.add_external_ids);
        union_strings(&mut venue.external_urls, &self.add_external_urls);
        union_strings(&mut venue.subjects, &self.add_subjects);
        union_strings(&mut venue.keywords, &self.add_keywords);
        union_strings(&mut venue.languages, &self.add_languages);
        union_strings(&mut venue.license, &self.add_license);
        union_source_checked(&mut venue.source_checked, &self.add_source_checked);
        venue.updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AliasSet, Provider, SerialKind};

    fn checked(source: Provider, ts: i64) -> SourceChecked {
        SourceChecked { source, ts }
    }

    #[test]
    fn test_stored_country_wins() {
        let stored = Venue {
            country: Some("CO".into()),
            ..Default::default()
        };
        let fresh = Venue {
            country: Some("US".into()),
            publisher: Some("Elsevier".into()),
            ..Default::default()
        };
        let patch = VenuePatch::compute(&stored, &fresh, ConflictPolicy::StoredWins);
        assert_eq!(patch.country, None);
        assert_eq!(patch.publisher.as_deref(), Some("Elsevier"));

        let mut updated = stored.clone();
        patch.apply(&mut updated, 10);
        assert_eq!(updated.country.as_deref(), Some("CO"));
        assert_eq!(updated.publisher_idx.as_deref(), Some("elsevier"));
    }

    #[test]
    fn test_most_recently_checked_overwrites_with_newer_provenance() {
        let stored = Venue {
            country: Some("CO".into()),
            source_checked: vec![checked(Provider::Scopus, 100)],
            ..Default::default()
        };
        let fresh = Venue {
            country: Some("US".into()),
            source_checked: vec![checked(Provider::Lens, 200)],
            ..Default::default()
        };
        let patch = VenuePatch::compute(&stored, &fresh, ConflictPolicy::MostRecentlyChecked);
        assert_eq!(patch.country.as_deref(), Some("US"));

        let older = Venue {
            source_checked: vec![checked(Provider::Lens, 50)],
            ..fresh
        };
        let patch = VenuePatch::compute(&stored, &older, ConflictPolicy::MostRecentlyChecked);
        assert_eq!(patch.country, None);
    }

    #[test]
    fn test_author_alias_union() {
        let stored = Author {
            full_name: "John Smith".into(),
            aliases: AliasSet::from_iter(["John Smith"]),
            ..Default::default()
        };
        let fresh = Author {
            full_name: "J. Smith".into(),
            aliases: AliasSet::from_iter(["J. Smith", "john smith"]),
            ..Default::default()
        };
        let patch = AuthorPatch::compute(&stored, &fresh, ConflictPolicy::StoredWins);
        assert_eq!(patch.full_name, None);
        assert_eq!(patch.add_aliases, vec!["J. Smith"]);

        let mut updated = stored.clone();
        patch.apply(&mut updated, 1);
        assert_eq!(updated.full_name, "John Smith");
        assert_eq!(updated.aliases.iter().collect::<Vec<_>>(), vec!["John Smith", "J. Smith"]);
    }

    #[test]
    fn test_identical_records_give_empty_patch() {
        let author = Author {
            full_name: "Alan Turing".into(),
            aliases: AliasSet::from_iter(["Alan Turing"]),
            external_ids: vec![ExternalId::new("orcid", "0000-0001")],
            source_checked: vec![checked(Provider::Lens, 1)],
            ..Default::default()
        };
        assert!(AuthorPatch::compute(&author, &author, ConflictPolicy::MostRecentlyChecked).is_empty());

        let work = Work {
            year_published: Some(1936),
            external_ids: vec![ExternalId::doi("10.1/x")],
            ..Default::default()
        };
        assert!(WorkPatch::compute(&work, &work, ConflictPolicy::StoredWins).is_empty());
    }

    #[test]
    fn test_apply_rechecks_blankness() {
        let stored = Work::default();
        let fresh = Work {
            volume: Some("12".into()),
            ..Default::default()
        };
        let patch = WorkPatch::compute(&stored, &fresh, ConflictPolicy::StoredWins);

        // another writer filled the volume after the patch was computed
        let mut current = Work {
            volume: Some("13".into()),
            ..Default::default()
        };
        patch.apply(&mut current, 5);
        assert_eq!(current.volume.as_deref(), Some("13"));
        assert_eq!(current.updated, 5);
    }

    #[test]
    fn test_venue_serial_changes() {
        let stored = Venue {
            serials: vec![Serial::new(SerialKind::Pissn, "0123-4567")],
            ..Default::default()
        };
        let fresh = Venue {
            serials: vec![
                Serial::new(SerialKind::Pissn, "01234567"),
                Serial::new(SerialKind::Eissn, "7654-3210"),
            ],
            ..Default::default()
        };
        let patch = VenuePatch::compute(&stored, &fresh, ConflictPolicy::StoredWins);
        assert_eq!(patch.add_serials.len(), 1);
        assert_eq!(patch.add_serials[0].value, "76543210");
    }

    #[test]
    fn test_institution_patch_adds_ids_and_aliases() {
        let stored = Institution {
            name: "Universidad de Antioquia".into(),
            aliases: AliasSet::from_iter(["Universidad de Antioquia"]),
            ..Default::default()
        };
        let fresh = Institution {
            name: "University of Antioquia".into(),
            external_ids: vec![ExternalId::new("ror", "https://ror.org/03bp5hc83")],
            ..Default::default()
        };
        let patch = InstitutionPatch::compute(&stored, &fresh);
        assert_eq!(patch.name, None);
        assert_eq!(patch.add_aliases, vec!["University of Antioquia"]);
        assert_eq!(patch.add_external_ids.len(), 1);
        assert!(InstitutionPatch::compute(&stored, &stored).is_empty());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("stored_wins".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::StoredWins);
        assert_eq!(
            "most-recently-checked".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::MostRecentlyChecked
        );
        assert!("newest".parse::<ConflictPolicy>().is_err());
    }
}
