//! Google Scholar citation records
//!
//! Scholar only contributes the citation count and the link to the citing
//! works list.

use super::{as_object, count, text, Normalizer};
use crate::error::ParseError;
use crate::types::{ExternalId, Provider, ProviderRecord};
use serde_json::Value;

pub struct ScholarNormalizer;

impl Normalizer for ScholarNormalizer {
    fn provider(&self) -> Provider {
        Provider::Scholar
    }

    fn parse(&self, raw: &Value, checked_at: i64) -> Result<ProviderRecord, ParseError> {
        let obj = as_object(raw)?;
        let mut record = ProviderRecord::new(Provider::Scholar, checked_at);

        record.document.citations_count = count(obj, "cites")?;
        record.document.citations_link = text(obj, "cites_link");
        if let Some(doi) = text(obj, "doi") {
            record.document.external_ids.push(ExternalId::doi(&doi));
        }

        Ok(record)
    }
}
