//! oaDOI / Unpaywall records: open-access flag and status only

use super::{as_object, flag, text, Normalizer};
use crate::error::ParseError;
use crate::types::{ExternalId, Provider, ProviderRecord};
use serde_json::Value;

pub struct OadoiNormalizer;

impl Normalizer for OadoiNormalizer {
    fn provider(&self) -> Provider {
        Provider::Oadoi
    }

    fn parse(&self, raw: &Value, checked_at: i64) -> Result<ProviderRecord, ParseError> {
        let obj = as_object(raw)?;
        let mut record = ProviderRecord::new(Provider::Oadoi, checked_at);

        record.document.is_open_access = flag(obj, "is_oa")?;
        record.document.open_access_status = text(obj, "oa_status");
        if let Some(doi) = text(obj, "doi") {
            record.document.external_ids.push(ExternalId::doi(&doi));
        }

        Ok(record)
    }
}
