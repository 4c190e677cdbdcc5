//! Venue merge and open-access registry enrichment

use super::{by_priority, union_external_ids, union_source_checked, union_strings};
use crate::enrichment::{CurrencyConverter, OpenAccessJournal, OpenAccessRegistry};
use crate::error::EnrichmentError;
use crate::types::{
    normalize_serial, Abbreviation, Provider, ProviderRecord, Serial, SerialKind, SourceChecked,
    Venue, VenueFragment,
};
use std::sync::Arc;

/// Merge the venue fragments of one work; `None` if no provider reports a venue
pub fn merge_venues(records: &[ProviderRecord]) -> Option<Venue> {
    let fragments: Vec<(&ProviderRecord, &VenueFragment)> = by_priority(records)
        .into_iter()
        .filter_map(|r| r.venue.as_ref().map(|v| (r, v)))
        .collect();
    if fragments.is_empty() {
        return None;
    }

    let title = first_text(&fragments, |v| &v.title);
    let publisher = first_text(&fragments, |v| &v.publisher);
    let mut venue = Venue {
        title_idx: title.as_ref().map(|t| t.to_lowercase()),
        title,
        publisher_idx: publisher.as_ref().map(|p| p.to_lowercase()),
        publisher,
        publication_type: first_text(&fragments, |v| &v.publication_type),
        country: first_text(&fragments, |v| &v.country),
        institution: first_text(&fragments, |v| &v.institution),
        ..Default::default()
    };

    for (record, fragment) in &fragments {
        union_serials(&mut venue.serials, &fragment.serials);
        union_abbreviations(&mut venue.abbreviations, &fragment.abbreviations);
        union_external_ids(&mut venue.external_ids, &fragment.external_ids);
        union_strings(&mut venue.aliases, &fragment.aliases);
        union_strings(&mut venue.external_urls, &fragment.external_urls);
        union_strings(&mut venue.subjects, &fragment.subjects);
        union_strings(&mut venue.keywords, &fragment.keywords);
        union_strings(&mut venue.languages, &fragment.languages);
        venue.source_checked.push(SourceChecked {
            source: record.provider,
            ts: record.checked_at,
        });
    }

    tracing::debug!(
        title = ?venue.title,
        serials = venue.serials.len(),
        providers = fragments.len(),
        "Merged venue fragments"
    );

    Some(venue)
}

/// First non-blank venue field in priority order, trimmed
fn first_text(
    fragments: &[(&ProviderRecord, &VenueFragment)],
    field: impl Fn(&VenueFragment) -> &Option<String>,
) -> Option<String> {
    fragments.iter().find_map(|(_, v)| {
        field(v)
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// Union serials by dash-stripped value
///
/// When the same value arrives with different types, a specific type
/// replaces `unknown` and `unknown` moves to `also_declared`; a second
/// specific type is kept in `also_declared` and the first one stays.
pub fn union_serials<'a>(target: &mut Vec<Serial>, incoming: impl IntoIterator<Item = &'a Serial>) {
    for serial in incoming {
        let value = normalize_serial(&serial.value);
        if value.is_empty() {
            continue;
        }
        match target.iter_mut().find(|s| s.value == value) {
            Some(existing) => {
                reconcile_kind(existing, &serial.kind);
                for kind in &serial.also_declared {
                    reconcile_kind(existing, kind);
                }
            }
            None => target.push(Serial {
                kind: serial.kind.clone(),
                value,
                also_declared: serial.also_declared.clone(),
            }),
        }
    }
}

fn reconcile_kind(existing: &mut Serial, kind: &SerialKind) {
    if &existing.kind == kind || existing.also_declared.contains(kind) || !kind.is_specific() {
        return;
    }
    if existing.kind.is_specific() {
        tracing::debug!(
            serial = %existing.value,
            kept = ?existing.kind,
            declared = ?kind,
            "Serial declared with conflicting types"
        );
        existing.also_declared.push(kind.clone());
    } else {
        // the specific type takes over; the original declaration is kept
        let original = std::mem::replace(&mut existing.kind, kind.clone());
        if !existing.also_declared.contains(&original) {
            existing.also_declared.push(original);
        }
    }
}

/// Union abbreviations by `(type, value)`, value compared case-insensitively
pub fn union_abbreviations<'a>(
    target: &mut Vec<Abbreviation>,
    incoming: impl IntoIterator<Item = &'a Abbreviation>,
) {
    for abbreviation in incoming {
        let value = abbreviation.value.trim();
        if value.is_empty() {
            continue;
        }
        let present = target
            .iter()
            .any(|a| a.kind == abbreviation.kind && a.value.eq_ignore_ascii_case(value));
        if !present {
            target.push(Abbreviation {
                kind: abbreviation.kind.clone(),
                value: value.to_string(),
            });
        }
    }
}

// ============================================================================
// Enrichment
// ============================================================================

/// Collaborators for venue enrichment; either may be absent
#[derive(Clone, Default)]
pub struct VenueEnrichment {
    pub registry: Option<Arc<dyn OpenAccessRegistry>>,
    pub currency: Option<Arc<dyn CurrencyConverter>>,
}

impl VenueEnrichment {
    pub fn new(registry: Arc<dyn OpenAccessRegistry>, currency: Option<Arc<dyn CurrencyConverter>>) -> Self {
        Self {
            registry: Some(registry),
            currency,
        }
    }

    /// No lookups at all
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Enrich a merged venue from the open-access registry
///
/// Looks up the preferred ISSN. Registry values only fill blank scalars;
/// lists and serials are unioned. Fees are copied with their currency and
/// converted to USD when possible. Returns whether registry data was
/// applied; lookup failures leave the venue as it was.
pub async fn enrich_venue(venue: &mut Venue, enrichment: &VenueEnrichment, checked_at: i64) -> bool {
    let Some(registry) = enrichment.registry.as_ref() else {
        return false;
    };
    let Some(issn) = venue.lookup_issn() else {
        tracing::debug!(title = ?venue.title, "Venue has no ISSN; skipping open-access lookup");
        return false;
    };

    let journal = match registry.lookup_issn(&issn).await {
        Ok(journal) => journal,
        Err(EnrichmentError::NotFound(_)) => {
            tracing::debug!(issn = %issn, "Venue not in open-access registry");
            return false;
        }
        Err(e) => {
            tracing::warn!(issn = %issn, error = %e, "Open-access registry lookup failed");
            return false;
        }
    };

    apply_journal(venue, &journal);

    let converter = enrichment.currency.as_deref();
    venue.submission_charges_usd =
        to_usd(venue.submission_charges, venue.submission_currency.as_deref(), converter).await;
    venue.apc_charges_usd = to_usd(venue.apc_charges, venue.apc_currency.as_deref(), converter).await;

    union_source_checked(
        &mut venue.source_checked,
        &[SourceChecked {
            source: Provider::Doaj,
            ts: checked_at,
        }],
    );

    tracing::debug!(issn = %issn, "Enriched venue from open-access registry");
    true
}

fn fill(slot: &mut Option<String>, value: &Option<String>) {
    let blank = slot.as_deref().map_or(true, |s| s.trim().is_empty());
    if blank {
        if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            *slot = Some(v.to_string());
        }
    }
}

fn apply_journal(venue: &mut Venue, journal: &OpenAccessJournal) {
    fill(&mut venue.title, &journal.title);
    fill(&mut venue.publisher, &journal.publisher);
    fill(&mut venue.country, &journal.country);
    fill(&mut venue.institution, &journal.institution);
    fill(&mut venue.editorial_review, &journal.editorial_review);
    venue.title_idx = venue.title.as_ref().map(|t| t.to_lowercase());
    venue.publisher_idx = venue.publisher.as_ref().map(|p| p.to_lowercase());

    venue.plagiarism_detection = venue.plagiarism_detection.or(journal.plagiarism_detection);
    venue.active = venue.active.or(journal.active);
    venue.publication_time = venue.publication_time.or(journal.publication_time);

    union_serials(&mut venue.serials, &journal.serials);
    union_abbreviations(&mut venue.abbreviations, &journal.abbreviations);
    union_strings(&mut venue.aliases, &journal.aliases);
    union_strings(&mut venue.subjects, &journal.subjects);
    union_strings(&mut venue.keywords, &journal.keywords);
    union_strings(&mut venue.languages, &journal.languages);
    union_strings(&mut venue.license, &journal.license);
    union_strings(&mut venue.external_urls, &journal.external_urls);

    if journal.submission_charges.is_some() {
        venue.submission_charges = journal.submission_charges;
        venue.submission_currency = journal.submission_currency.clone();
    }
    if journal.apc_charges.is_some() {
        venue.apc_charges = journal.apc_charges;
        venue.apc_currency = journal.apc_currency.clone();
    }
}

/// USD amount of a fee; `None` when the amount or currency is missing or
/// the conversion fails
async fn to_usd(
    amount: Option<f64>,
    currency: Option<&str>,
    converter: Option<&dyn CurrencyConverter>,
) -> Option<f64> {
    let amount = amount?;
    let currency = currency.map(str::trim).filter(|c| !c.is_empty())?;
    if currency.eq_ignore_ascii_case("USD") {
        return Some(amount);
    }

    match converter?.convert(amount, currency, "USD").await {
        Ok(usd) => Some(usd),
        Err(e) => {
            tracing::warn!(currency = %currency, error = %e, "Fee conversion to USD failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::FixedRateConverter;
    use async_trait::async_trait;

    fn record(provider: Provider, venue: VenueFragment) -> ProviderRecord {
        ProviderRecord {
            venue: Some(venue),
            ..ProviderRecord::new(provider, 1_700_000_000)
        }
    }

    struct OneJournal(OpenAccessJournal);

    #[async_trait]
    impl OpenAccessRegistry for OneJournal {
        async fn lookup_issn(&self, issn: &str) -> Result<OpenAccessJournal, EnrichmentError> {
            if self.0.serials.iter().any(|s| s.issn_dashed().as_deref() == Some(issn)) {
                Ok(self.0.clone())
            } else {
                Err(EnrichmentError::NotFound(issn.to_string()))
            }
        }
    }

    #[test]
    fn test_dashed_and_stripped_serial_merge() {
        let records = vec![
            record(Provider::Lens, VenueFragment {
                serials: vec![Serial { kind: SerialKind::Pissn, value: "0123-4567".into(), also_declared: vec![] }],
                ..Default::default()
            }),
            record(Provider::Scopus, VenueFragment {
                serials: vec![Serial::new(SerialKind::Pissn, "01234567")],
                ..Default::default()
            }),
        ];
        let venue = merge_venues(&records).unwrap();
        assert_eq!(venue.serials.len(), 1);
        assert_eq!(venue.serials[0].value, "01234567");
    }

    #[test]
    fn test_serial_type_reconciliation() {
        let mut serials = vec![Serial::new(SerialKind::Unknown, "1111-1111")];
        union_serials(&mut serials, &[Serial::new(SerialKind::Eissn, "11111111")]);
        assert_eq!(serials[0].kind, SerialKind::Eissn);
        assert_eq!(serials[0].also_declared, vec![SerialKind::Unknown]);

        union_serials(&mut serials, &[Serial::new(SerialKind::Pissn, "11111111")]);
        assert_eq!(serials[0].kind, SerialKind::Eissn);
        assert_eq!(serials[0].also_declared, vec![SerialKind::Unknown, SerialKind::Pissn]);

        union_serials(&mut serials, &[Serial::new(SerialKind::Pissn, "11111111")]);
        assert_eq!(serials[0].also_declared.len(), 2);
    }

    #[test]
    fn test_scalars_by_priority() {
        let records = vec![
            record(Provider::Scopus, VenueFragment {
                title: Some("Revista Facultad de Ingenieria".into()),
                publisher: Some("UdeA".into()),
                ..Default::default()
            }),
            record(Provider::WebOfScience, VenueFragment {
                title: Some("REVISTA FACULTAD DE INGENIERIA-UNIVERSIDAD DE ANTIOQUIA".into()),
                ..Default::default()
            }),
        ];
        let venue = merge_venues(&records).unwrap();
        assert_eq!(venue.title.as_deref(), Some("REVISTA FACULTAD DE INGENIERIA-UNIVERSIDAD DE ANTIOQUIA"));
        assert_eq!(venue.title_idx.as_deref(), Some("revista facultad de ingenieria-universidad de antioquia"));
        assert_eq!(venue.publisher.as_deref(), Some("UdeA"));
        assert_eq!(venue.source_checked.len(), 2);
    }

    #[test]
    fn test_no_venue_fragments() {
        assert!(merge_venues(&[ProviderRecord::new(Provider::Lens, 0)]).is_none());
    }

    #[test]
    fn test_abbreviations_union() {
        let mut abbreviations = vec![Abbreviation { kind: "iso".into(), value: "Rev. Fac. Ing.".into() }];
        union_abbreviations(&mut abbreviations, &[
            Abbreviation { kind: "iso".into(), value: "rev. fac. ing.".into() },
            Abbreviation { kind: "jcr".into(), value: "REV FAC ING-UNIV ANT".into() },
        ]);
        assert_eq!(abbreviations.len(), 2);
    }

    fn journal() -> OpenAccessJournal {
        OpenAccessJournal {
            title: Some("Revista Facultad de Ingeniería".into()),
            country: Some("CO".into()),
            serials: vec![Serial::new(SerialKind::Eissn, "2422-2844")],
            license: vec!["CC BY-NC-SA".into()],
            apc_charges: Some(0.0),
            apc_currency: Some("USD".into()),
            submission_charges: Some(100.0),
            submission_currency: Some("EUR".into()),
            active: Some(true),
            ..Default::default()
        }
    }

    fn venue() -> Venue {
        Venue {
            title: Some("Rev Fac Ing".into()),
            country: Some("Colombia".into()),
            serials: vec![Serial::new(SerialKind::Eissn, "2422-2844")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_enrich_fills_blanks_and_converts() {
        let enrichment = VenueEnrichment::new(
            Arc::new(OneJournal(journal())),
            Some(Arc::new(FixedRateConverter::new([("EUR", 1.1)]))),
        );
        let mut venue = venue();
        assert!(enrich_venue(&mut venue, &enrichment, 42).await);

        // stored scalars are kept
        assert_eq!(venue.title.as_deref(), Some("Rev Fac Ing"));
        assert_eq!(venue.country.as_deref(), Some("Colombia"));
        assert_eq!(venue.license, vec!["CC BY-NC-SA"]);
        assert_eq!(venue.active, Some(true));
        assert_eq!(venue.apc_charges_usd, Some(0.0));
        assert!((venue.submission_charges_usd.unwrap() - 110.0).abs() < 1e-9);
        assert!(venue.source_checked.contains(&SourceChecked { source: Provider::Doaj, ts: 42 }));
    }

    #[tokio::test]
    async fn test_conversion_failure_leaves_usd_blank() {
        let mut journal = journal();
        journal.submission_currency = Some("COP".into());
        let enrichment = VenueEnrichment::new(
            Arc::new(OneJournal(journal)),
            Some(Arc::new(FixedRateConverter::default())),
        );
        let mut venue = venue();
        assert!(enrich_venue(&mut venue, &enrichment, 42).await);
        assert_eq!(venue.submission_charges, Some(100.0));
        assert_eq!(venue.submission_currency.as_deref(), Some("COP"));
        assert_eq!(venue.submission_charges_usd, None);
    }

    #[tokio::test]
    async fn test_unknown_issn_is_untouched() {
        let enrichment = VenueEnrichment::new(Arc::new(OneJournal(journal())), None);
        let mut venue = Venue {
            serials: vec![Serial::new(SerialKind::Pissn, "0000-0000")],
            ..Default::default()
        };
        let before = venue.clone();
        assert!(!enrich_venue(&mut venue, &enrichment, 42).await);
        assert_eq!(venue, before);
    }

    #[tokio::test]
    async fn test_disabled_enrichment() {
        let mut venue = venue();
        assert!(!enrich_venue(&mut venue, &VenueEnrichment::disabled(), 42).await);
    }
}
