//! Normalizer for records already extracted into the fragment shape
//!
//! Index-of-record and aggregator exports arrive pre-extracted as
//! `{"document": {..}, "authors": [..], "venue": {..}}`. Every key is
//! optional.

use super::{as_object, Normalizer};
use crate::error::ParseError;
use crate::types::{
    normalize_serial, AuthorFragment, DocumentFragment, ExternalId, Provider, ProviderRecord,
    VenueFragment,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CanonicalBody {
    document: DocumentFragment,
    authors: Vec<AuthorFragment>,
    venue: Option<VenueFragment>,
}

/// Reads the fragment shape for one provider
pub struct CanonicalJsonNormalizer {
    provider: Provider,
}

impl CanonicalJsonNormalizer {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

fn normalize_ids(ids: &mut Vec<ExternalId>) {
    *ids = ids
        .drain(..)
        .map(|id| ExternalId::new(id.source, id.value))
        .filter(|id| !id.source.is_empty() && !id.value.is_empty())
        .collect();
}

impl Normalizer for CanonicalJsonNormalizer {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn parse(&self, raw: &Value, checked_at: i64) -> Result<ProviderRecord, ParseError> {
        as_object(raw)?;
        let body: CanonicalBody = serde_json::from_value(raw.clone())?;

        let mut record = ProviderRecord::new(self.provider, checked_at);
        record.document = body.document;
        record.authors = body.authors;
        record.venue = body.venue;

        normalize_ids(&mut record.document.external_ids);
        for author in &mut record.authors {
            normalize_ids(&mut author.external_ids);
            for affiliation in &mut author.affiliations {
                normalize_ids(&mut affiliation.external_ids);
            }
        }
        if let Some(venue) = record.venue.as_mut() {
            normalize_ids(&mut venue.external_ids);
            for serial in &mut venue.serials {
                serial.value = normalize_serial(&serial.value);
            }
            venue.serials.retain(|s| !s.value.is_empty());
        }

        Ok(record)
    }
}
