//! DOAJ journal records
//!
//! Reads both the legacy `bibjson` layout (`identifier`, `apc`,
//! `submission_charges`, `link`) and the flat layout of newer exports
//! (`pissn`/`eissn`, `publisher.name`). The journal feeds venue enrichment;
//! as a provider record it contributes a venue fragment only.

use super::{amount, as_object, count, flag, strings, text, Normalizer};
use crate::enrichment::OpenAccessJournal;
use crate::error::ParseError;
use crate::types::{Provider, ProviderRecord, Serial, SerialKind, VenueFragment};
use serde_json::{Map, Value};

/// Raw-record key kind under which staged DOAJ journals are found
pub const ISSN_KEY: &str = "issn";

fn nested<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Map<String, Value>> {
    obj.get(field).and_then(Value::as_object)
}

/// Text field that may also be an object carrying `key`
fn text_or_nested(obj: &Map<String, Value>, field: &str, key: &str) -> Option<String> {
    text(obj, field).or_else(|| nested(obj, field).and_then(|inner| text(inner, key)))
}

/// Strings, or objects from which `key` is taken
fn terms(obj: &Map<String, Value>, field: &str, key: &str) -> Vec<String> {
    match obj.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(inner) => text(inner, key),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => strings(obj, field),
    }
}

fn fee(obj: &Map<String, Value>, field: &str) -> Result<(Option<f64>, Option<String>), ParseError> {
    match nested(obj, field) {
        Some(charges) => Ok((amount(charges, "average_price")?, text(charges, "currency"))),
        None => Ok((None, None)),
    }
}

/// Parse a DOAJ journal (with or without the `bibjson` envelope)
pub fn parse_journal(raw: &Value) -> Result<OpenAccessJournal, ParseError> {
    let outer = as_object(raw)?;
    let reg = match outer.get("bibjson") {
        Some(inner) => as_object(inner)?,
        None => outer,
    };

    let mut journal = OpenAccessJournal {
        title: text(reg, "title"),
        publisher: text_or_nested(reg, "publisher", "name"),
        country: text(reg, "country")
            .or_else(|| nested(reg, "publisher").and_then(|p| text(p, "country"))),
        institution: text_or_nested(reg, "institution", "name"),
        subjects: terms(reg, "subject", "term"),
        keywords: strings(reg, "keywords"),
        languages: strings(reg, "language"),
        license: terms(reg, "license", "type"),
        editorial_review: nested(reg, "editorial_review")
            .and_then(|e| text(e, "process"))
            .or_else(|| nested(reg, "editorial").and_then(|e| terms(e, "review_process", "").into_iter().next())),
        plagiarism_detection: match nested(reg, "plagiarism_detection").or_else(|| nested(reg, "plagiarism")) {
            Some(p) => flag(p, "detection")?,
            None => None,
        },
        active: flag(reg, "active")?,
        publication_time: match count(reg, "publication_time")? {
            Some(weeks) => Some(weeks),
            None => count(reg, "publication_time_weeks")?,
        },
        ..Default::default()
    };

    if let Some(alternative) = text(reg, "alternative_title") {
        journal.aliases.push(alternative);
    }

    if let Some(Value::Array(identifiers)) = reg.get("identifier") {
        for entry in identifiers.iter().filter_map(Value::as_object) {
            if let Some(id) = text(entry, "id") {
                let kind = text(entry, "type").map(|t| SerialKind::parse(&t)).unwrap_or(SerialKind::Unknown);
                journal.serials.push(Serial::new(kind, &id));
            }
        }
    }
    for (field, kind) in [("pissn", SerialKind::Pissn), ("eissn", SerialKind::Eissn)] {
        if let Some(id) = text(reg, field) {
            let serial = Serial::new(kind, &id);
            if !journal.serials.iter().any(|s| s.value == serial.value) {
                journal.serials.push(serial);
            }
        }
    }

    if let Some(Value::Array(links)) = reg.get("link") {
        for link in links.iter().filter_map(Value::as_object) {
            if text(link, "type").as_deref() == Some("homepage") {
                if let Some(url) = text(link, "url") {
                    journal.external_urls.push(url);
                }
            }
        }
    }
    if let Some(url) = nested(reg, "ref").and_then(|r| text(r, "journal")) {
        if !journal.external_urls.contains(&url) {
            journal.external_urls.push(url);
        }
    }

    (journal.submission_charges, journal.submission_currency) = fee(reg, "submission_charges")?;
    (journal.apc_charges, journal.apc_currency) = fee(reg, "apc")?;

    Ok(journal)
}

/// Lookup keys for staging a DOAJ journal: one per serial value
pub fn staging_keys(journal: &OpenAccessJournal) -> Vec<(&'static str, String)> {
    journal
        .serials
        .iter()
        .map(|s| (ISSN_KEY, s.value.clone()))
        .collect()
}

pub struct DoajNormalizer;

impl Normalizer for DoajNormalizer {
    fn provider(&self) -> Provider {
        Provider::Doaj
    }

    fn parse(&self, raw: &Value, checked_at: i64) -> Result<ProviderRecord, ParseError> {
        let journal = parse_journal(raw)?;
        let mut record = ProviderRecord::new(Provider::Doaj, checked_at);
        record.venue = Some(VenueFragment {
            title: journal.title,
            publisher: journal.publisher,
            country: journal.country,
            institution: journal.institution,
            serials: journal.serials,
            abbreviations: journal.abbreviations,
            aliases: journal.aliases,
            external_urls: journal.external_urls,
            subjects: journal.subjects,
            keywords: journal.keywords,
            languages: journal.languages,
            ..Default::default()
        });
        Ok(record)
    }
}
