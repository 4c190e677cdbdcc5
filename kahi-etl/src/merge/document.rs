//! Document merge: N provider fragments of one work into one `Work` draft

use super::{by_priority, pick, pick_text, union_external_ids, union_strings};
use crate::lang::{detect_language, DEFAULT_LANG};
use crate::types::{ProviderRecord, ProviderRole, SourceChecked, Title, Work};

/// Merge the document fragments of one work
///
/// Scalars come from the highest-priority provider that reports them,
/// except citation counts (citation tracker wins) and open-access status
/// (open-access resolver wins). The result carries no author references
/// and no venue id; those are filled in after linking.
pub fn merge_documents(records: &[ProviderRecord]) -> Work {
    let ordered = by_priority(records);

    let mut work = Work {
        publication_type: pick_text(&ordered, |r| &r.document.publication_type),
        start_page: pick_text(&ordered, |r| &r.document.start_page),
        end_page: pick_text(&ordered, |r| &r.document.end_page),
        volume: pick_text(&ordered, |r| &r.document.volume),
        issue: pick_text(&ordered, |r| &r.document.issue),
        year_published: pick(&ordered, |r| r.document.year_published),
        date_published: pick(&ordered, |r| r.document.date_published),
        funding_organization: pick_text(&ordered, |r| &r.document.funding_organization),
        funding_details: pick_text(&ordered, |r| &r.document.funding_details),
        references_count: pick(&ordered, |r| r.document.references_count),
        bibtex: pick_text(&ordered, |r| &r.document.bibtex),
        ..Default::default()
    };

    // Titles: one per language, first provider in priority order fills the slot
    for record in &ordered {
        for fragment in &record.document.titles {
            let text = fragment.title.trim();
            if text.is_empty() {
                continue;
            }
            let lang = fragment
                .lang
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_lowercase)
                .or_else(|| detect_language(text).map(String::from))
                .unwrap_or_else(|| DEFAULT_LANG.to_string());
            if !work.titles.iter().any(|t| t.lang == lang) {
                work.titles.push(Title::new(text, lang));
            }
        }
    }

    work.abstract_text = pick_text(&ordered, |r| &r.document.abstract_text);
    work.abstract_idx = work.abstract_text.as_ref().map(|a| a.to_lowercase());

    // Citation tracker overrides everyone for citation fields
    let tracker: Vec<&ProviderRecord> = ordered
        .iter()
        .copied()
        .filter(|r| r.provider.role() == ProviderRole::CitationTracker)
        .collect();
    work.citations_count = pick(&tracker, |r| r.document.citations_count)
        .or_else(|| pick(&ordered, |r| r.document.citations_count));
    work.citations_link = pick_text(&tracker, |r| &r.document.citations_link)
        .or_else(|| pick_text(&ordered, |r| &r.document.citations_link));

    let resolver: Vec<&ProviderRecord> = ordered
        .iter()
        .copied()
        .filter(|r| r.provider.role() == ProviderRole::OpenAccessResolver)
        .collect();
    work.is_open_access = pick(&resolver, |r| r.document.is_open_access)
        .or_else(|| pick(&ordered, |r| r.document.is_open_access));
    work.open_access_status = pick_text(&resolver, |r| &r.document.open_access_status)
        .or_else(|| pick_text(&ordered, |r| &r.document.open_access_status));

    for record in &ordered {
        union_external_ids(&mut work.external_ids, &record.document.external_ids);
        union_strings(&mut work.languages, &record.document.languages);
        union_strings(&mut work.keywords, &record.document.keywords);
        union_strings(&mut work.subjects, &record.document.subjects);
        union_strings(&mut work.urls, &record.document.urls);
        work.source_checked.push(SourceChecked {
            source: record.provider,
            ts: record.checked_at,
        });
    }

    tracing::debug!(
        providers = ordered.len(),
        titles = work.titles.len(),
        external_ids = work.external_ids.len(),
        "Merged document fragments"
    );

    work
}
