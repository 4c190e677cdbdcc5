//! Merge of per-provider fragments into canonical drafts
//!
//! One field policy for every merge:
//! - scalars: highest-priority provider with a non-blank value wins
//! - identifiers: union keyed by `source`, first (highest priority) wins
//! - free lists: order-preserving union
//!
//! Nothing here reads the clock, so merging the same inputs twice yields
//! identical drafts.

pub mod authors;
pub mod document;
pub mod venue;

pub use authors::{resolve_authors, UnmatchedAuthorPolicy};
pub use document::merge_documents;
pub use venue::{enrich_venue, merge_venues, VenueEnrichment};

use crate::types::{ExternalId, Provider, ProviderRecord, SourceChecked};
use std::collections::HashSet;

/// Records sorted by descending provider priority, one per provider
///
/// A second record from the same provider is dropped with a warning.
pub fn by_priority(records: &[ProviderRecord]) -> Vec<&ProviderRecord> {
    let mut ordered: Vec<&ProviderRecord> = records.iter().collect();
    ordered.sort_by_key(|r| std::cmp::Reverse(r.provider.priority()));

    let mut seen: HashSet<Provider> = HashSet::new();
    ordered.retain(|r| {
        if seen.insert(r.provider) {
            true
        } else {
            tracing::warn!(provider = %r.provider, "Dropping duplicate fragment from provider");
            false
        }
    });
    ordered
}

/// First non-blank value in priority order
pub(crate) fn pick<'a, T: 'a, F>(ordered: &[&'a ProviderRecord], field: F) -> Option<T>
where
    F: Fn(&'a ProviderRecord) -> Option<T>,
{
    ordered.iter().find_map(|r| field(*r))
}

/// First non-blank string in priority order, trimmed
pub(crate) fn pick_text<'a, F>(ordered: &[&'a ProviderRecord], field: F) -> Option<String>
where
    F: Fn(&'a ProviderRecord) -> &'a Option<String>,
{
    ordered.iter().find_map(|r| {
        field(*r)
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// Append `incoming` ids whose `source` is not yet present
///
/// DOI values are lowercased before the check.
pub fn union_external_ids<'a>(
    target: &mut Vec<ExternalId>,
    incoming: impl IntoIterator<Item = &'a ExternalId>,
) {
    for id in incoming {
        let id = ExternalId::new(id.source.as_str(), id.value.as_str());
        if id.value.is_empty() || id.source.is_empty() {
            continue;
        }
        if !target.iter().any(|existing| existing.source == id.source) {
            target.push(id);
        }
    }
}

/// Order-preserving union of strings, compared case-insensitively
pub fn union_strings<'a>(target: &mut Vec<String>, incoming: impl IntoIterator<Item = &'a String>) {
    for value in incoming {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if !target.iter().any(|t| t.eq_ignore_ascii_case(value)) {
            target.push(value.to_string());
        }
    }
}

/// Append provenance entries not already logged
pub fn union_source_checked<'a>(
    target: &mut Vec<SourceChecked>,
    incoming: impl IntoIterator<Item = &'a SourceChecked>,
) {
    for entry in incoming {
        if !target.contains(entry) {
            target.push(*entry);
        }
    }
}
