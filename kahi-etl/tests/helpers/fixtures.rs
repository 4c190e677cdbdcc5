//! Raw provider record builders

use serde_json::{json, Value};

/// Canonical-shape provider record for one work
///
/// `authors` are `(full name, orcid)` pairs; every author is affiliated
/// with `affiliation` when given.
pub fn canonical_record(
    doi: Option<&str>,
    title: &str,
    year: i32,
    authors: &[(&str, Option<&str>)],
    affiliation: Option<&str>,
) -> Value {
    let ids: Vec<Value> = doi
        .map(|d| vec![json!({"source": "doi", "value": d})])
        .unwrap_or_default();
    let authors: Vec<Value> = authors
        .iter()
        .map(|(name, orcid)| {
            let ids: Vec<Value> = orcid
                .map(|o| vec![json!({"source": "orcid", "value": o})])
                .unwrap_or_default();
            let affiliations: Vec<Value> = affiliation
                .map(|a| vec![json!({"name": a})])
                .unwrap_or_default();
            json!({"full_name": name, "external_ids": ids, "affiliations": affiliations})
        })
        .collect();

    json!({
        "document": {
            "titles": [{"title": title}],
            "year_published": year,
            "external_ids": ids
        },
        "authors": authors
    })
}

/// Attach a venue with one print ISSN to a canonical record
pub fn with_venue(mut record: Value, title: &str, pissn: &str, country: Option<&str>) -> Value {
    record["venue"] = json!({
        "title": title,
        "country": country,
        "serials": [{"type": "pissn", "value": pissn}]
    });
    record
}

/// DOAJ journal in the bibjson layout with an APC
pub fn doaj_journal(title: &str, eissn: &str, apc: f64, currency: &str) -> Value {
    json!({"bibjson": {
        "title": title,
        "identifier": [{"type": "eissn", "id": eissn}],
        "publisher": "Universidad de Antioquia",
        "country": "CO",
        "apc": {"average_price": apc, "currency": currency},
        "subject": [{"term": "Medicine"}]
    }})
}
