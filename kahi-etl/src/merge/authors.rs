//! Author-institution resolution across providers for one work
//!
//! The anchor provider's author list fixes the author order. Every other
//! provider's authors are matched against the anchor authors by name and
//! folded into them; affiliations are matched by institution name so the
//! same organization is not listed twice under different spellings.

use super::{by_priority, union_external_ids, union_source_checked, union_strings};
use crate::similarity::{AFFILIATION_NAMES, AUTHOR_NAMES};
use crate::types::{
    clean, AffiliationFragment, AliasSet, Author, AuthorFragment, Institution, ProviderRecord,
    ResolvedAuthor, SourceChecked,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do with non-anchor authors that match no anchor author
///
/// With no anchor list at all, every reported author is kept regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedAuthorPolicy {
    /// Drop them; avoids near-duplicate author entries
    #[default]
    Exclude,
    /// Append them after the anchor authors
    Append,
}

impl FromStr for UnmatchedAuthorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclude" => Ok(Self::Exclude),
            "append" => Ok(Self::Append),
            other => Err(format!("Unknown unmatched-author policy: {}", other)),
        }
    }
}

impl fmt::Display for UnmatchedAuthorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclude => f.write_str("exclude"),
            Self::Append => f.write_str("append"),
        }
    }
}

/// Author being assembled from several providers
struct Draft {
    author: Author,
    affiliations: Vec<Institution>,
    is_corresponding: Option<bool>,
    corresponding_email: Option<String>,
    corresponding_address: Option<String>,
}

/// Resolve the author lists of all providers into one list for the work
pub fn resolve_authors(
    records: &[ProviderRecord],
    policy: UnmatchedAuthorPolicy,
) -> Vec<ResolvedAuthor> {
    let ordered = by_priority(records);
    let mut lists: Vec<&ProviderRecord> = ordered
        .into_iter()
        .filter(|r| r.authors.iter().any(|a| a.display_name().is_some()))
        .collect();

    if lists.is_empty() {
        return Vec::new();
    }

    // Anchor-capable providers first, in anchor order; the rest keep priority order
    lists.sort_by_key(|r| r.provider.anchor_rank().unwrap_or(u8::MAX));
    let has_anchor = lists[0].provider.anchor_rank().is_some();
    let anchor = lists[0];
    let keep_unmatched = !has_anchor || policy == UnmatchedAuthorPolicy::Append;

    tracing::debug!(
        anchor = %anchor.provider,
        anchored = has_anchor,
        providers = lists.len(),
        "Resolving authors"
    );

    let mut drafts: Vec<Draft> = anchor
        .authors
        .iter()
        .filter_map(|a| draft_from(a, stamp(anchor)))
        .collect();
    let anchor_len = drafts.len();

    for complement in &lists[1..] {
        let mut consumed = vec![false; complement.authors.len()];

        for draft in drafts.iter_mut() {
            let candidates = complement
                .authors
                .iter()
                .enumerate()
                .filter(|(idx, _)| !consumed[*idx])
                .filter_map(|(idx, a)| a.display_name().map(|name| (idx, name)));

            if let Some(hit) = AUTHOR_NAMES.best_match(&draft.author.full_name, candidates) {
                tracing::debug!(
                    author = %draft.author.full_name,
                    provider = %complement.provider,
                    stage = hit.matched_on,
                    score = hit.score,
                    "Matched author across providers"
                );
                consumed[hit.candidate] = true;
                absorb(draft, &complement.authors[hit.candidate], stamp(complement));
            }
        }

        for (idx, fragment) in complement.authors.iter().enumerate() {
            if consumed[idx] {
                continue;
            }
            if keep_unmatched {
                if let Some(draft) = draft_from(fragment, stamp(complement)) {
                    drafts.push(draft);
                }
            } else {
                tracing::debug!(
                    provider = %complement.provider,
                    author = ?fragment.display_name(),
                    "Excluding author not matched to anchor list"
                );
            }
        }
    }

    // A lone anchor author is the corresponding author by convention
    let single_author = has_anchor && anchor_len == 1;

    drafts
        .into_iter()
        .enumerate()
        .map(|(idx, draft)| ResolvedAuthor {
            is_corresponding: (single_author && idx == 0) || draft.is_corresponding.unwrap_or(false),
            author: draft.author,
            affiliations: draft.affiliations,
            corresponding_email: draft.corresponding_email,
            corresponding_address: draft.corresponding_address,
        })
        .collect()
}

fn stamp(record: &ProviderRecord) -> SourceChecked {
    SourceChecked {
        source: record.provider,
        ts: record.checked_at,
    }
}

/// Initials from given names: "Alan Mathison" -> "AM"
fn derive_initials(first_names: &str) -> Option<String> {
    let initials: String = first_names
        .split(|c: char| c.is_whitespace() || c == '-' || c == '.')
        .filter_map(|part| part.chars().next())
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .collect();
    if initials.is_empty() {
        None
    } else {
        Some(initials)
    }
}

fn draft_from(fragment: &AuthorFragment, checked: SourceChecked) -> Option<Draft> {
    let full_name = fragment.display_name()?;

    let mut aliases = AliasSet::new();
    aliases.insert(&full_name);
    aliases.extend(fragment.aliases.iter().map(String::as_str));

    let first_names = clean(fragment.first_names.clone());
    let initials = clean(fragment.initials.clone())
        .or_else(|| first_names.as_deref().and_then(derive_initials));

    let mut author = Author {
        full_name,
        first_names,
        last_names: clean(fragment.last_names.clone()),
        initials,
        aliases,
        source_checked: vec![checked],
        ..Default::default()
    };
    union_external_ids(&mut author.external_ids, &fragment.external_ids);
    union_strings(&mut author.keywords, &fragment.keywords);

    let mut draft = Draft {
        author,
        affiliations: Vec::new(),
        is_corresponding: fragment.is_corresponding,
        corresponding_email: clean(fragment.corresponding_email.clone()),
        corresponding_address: clean(fragment.corresponding_address.clone()),
    };
    for affiliation in &fragment.affiliations {
        add_affiliation(&mut draft.affiliations, affiliation, checked);
    }
    Some(draft)
}

/// Fold a matched complement author into the draft
fn absorb(draft: &mut Draft, fragment: &AuthorFragment, checked: SourceChecked) {
    let author = &mut draft.author;

    if let Some(name) = fragment.display_name() {
        author.aliases.insert(&name);
    }
    author.aliases.extend(fragment.aliases.iter().map(String::as_str));

    if author.first_names.is_none() {
        author.first_names = clean(fragment.first_names.clone());
    }
    if author.last_names.is_none() {
        author.last_names = clean(fragment.last_names.clone());
    }
    if author.initials.is_none() {
        author.initials = clean(fragment.initials.clone())
            .or_else(|| author.first_names.as_deref().and_then(derive_initials));
    }

    // Anchor ids were added first, so same-source conflicts keep the anchor's
    union_external_ids(&mut author.external_ids, &fragment.external_ids);
    union_strings(&mut author.keywords, &fragment.keywords);
    union_source_checked(&mut author.source_checked, [&checked]);

    if draft.is_corresponding.is_none() {
        draft.is_corresponding = fragment.is_corresponding;
    }
    if draft.corresponding_email.is_none() {
        draft.corresponding_email = clean(fragment.corresponding_email.clone());
    }
    if draft.corresponding_address.is_none() {
        draft.corresponding_address = clean(fragment.corresponding_address.clone());
    }

    for affiliation in &fragment.affiliations {
        add_affiliation(&mut draft.affiliations, affiliation, checked);
    }
}

/// Build an institution from a fragment; `None` when it has no name
pub fn institution_from(fragment: &AffiliationFragment, checked: SourceChecked) -> Option<Institution> {
    let name = clean(fragment.name.clone())?;

    let mut aliases = AliasSet::new();
    aliases.insert(&name);
    aliases.extend(fragment.aliases.iter().map(String::as_str));

    let mut institution = Institution {
        name,
        aliases,
        types: Vec::new(),
        addresses: fragment.addresses.clone(),
        source_checked: vec![checked],
        ..Default::default()
    };
    union_strings(&mut institution.abbreviations, &fragment.abbreviations);
    union_strings(&mut institution.types, &fragment.types);
    union_strings(&mut institution.external_urls, &fragment.external_urls);
    union_external_ids(&mut institution.external_ids, &fragment.external_ids);
    Some(institution)
}

/// Merge `other` into `target`: aliases, ids and lists are unioned
pub fn merge_institution(target: &mut Institution, other: &Institution) {
    target.aliases.insert(&other.name);
    target.aliases.extend(other.aliases.iter());
    union_strings(&mut target.abbreviations, &other.abbreviations);
    union_strings(&mut target.types, &other.types);
    union_strings(&mut target.external_urls, &other.external_urls);
    union_external_ids(&mut target.external_ids, &other.external_ids);
    for address in &other.addresses {
        if !target.addresses.contains(address) {
            target.addresses.push(address.clone());
        }
    }
    union_source_checked(&mut target.source_checked, &other.source_checked);
}

fn add_affiliation(affiliations: &mut Vec<Institution>, fragment: &AffiliationFragment, checked: SourceChecked) {
    let Some(incoming) = institution_from(fragment, checked) else {
        return;
    };

    let shares_id = affiliations.iter().position(|existing| {
        existing
            .external_ids
            .iter()
            .any(|id| incoming.external_ids.contains(id))
    });
    let by_name = || {
        AFFILIATION_NAMES
            .best_match(
                &incoming.name,
                affiliations.iter().enumerate().map(|(i, a)| (i, a.name.clone())),
            )
            .map(|m| m.candidate)
    };

    match shares_id.or_else(by_name) {
        Some(idx) => merge_institution(&mut affiliations[idx], &incoming),
        None => affiliations.push(incoming),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExternalId, Provider};

    fn author(name: &str) -> AuthorFragment {
        AuthorFragment {
            full_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn affiliation(name: &str) -> AffiliationFragment {
        AffiliationFragment {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn record(provider: Provider, authors: Vec<AuthorFragment>) -> ProviderRecord {
        ProviderRecord {
            authors,
            ..ProviderRecord::new(provider, 1_600_000_000)
        }
    }

    #[test]
    fn test_turing_merged_with_orcid_and_alias() {
        let scopus = record(Provider::Scopus, vec![author("A. Turing")]);
        let wos = record(
            Provider::WebOfScience,
            vec![AuthorFragment {
                external_ids: vec![ExternalId::new("orcid", "0000-1")],
                ..author("Alan Turing")
            }],
        );

        let resolved = resolve_authors(&[scopus, wos], UnmatchedAuthorPolicy::Exclude);
        assert_eq!(resolved.len(), 1);
        let turing = &resolved[0].author;
        assert_eq!(turing.full_name, "Alan Turing");
        assert!(turing.aliases.contains("A. Turing"));
        assert!(turing.aliases.contains("Alan Turing"));
        assert_eq!(turing.external_ids, vec![ExternalId::new("orcid", "0000-1")]);
        assert_eq!(turing.source_checked.len(), 2);
    }

    #[test]
    fn test_anchor_order_prefers_lens() {
        let wos = record(Provider::WebOfScience, vec![author("Grace Hopper"), author("Ada Lovelace")]);
        let lens = record(Provider::Lens, vec![author("Ada Lovelace"), author("Grace Hopper")]);
        let resolved = resolve_authors(&[wos, lens], UnmatchedAuthorPolicy::Exclude);
        let names: Vec<&str> = resolved.iter().map(|r| r.author.full_name.as_str()).collect();
        assert_eq!(names, vec!["Ada Lovelace", "Grace Hopper"]);
    }

    #[test]
    fn test_unmatched_excluded_by_default() {
        let lens = record(Provider::Lens, vec![author("Ada Lovelace"), author("Grace Hopper")]);
        let scopus = record(Provider::Scopus, vec![author("Ada Lovelace"), author("Charles Babbage")]);

        let excluded = resolve_authors(&[lens.clone(), scopus.clone()], UnmatchedAuthorPolicy::Exclude);
        assert_eq!(excluded.len(), 2);

        let appended = resolve_authors(&[lens, scopus], UnmatchedAuthorPolicy::Append);
        assert_eq!(appended.len(), 3);
        assert_eq!(appended[2].author.full_name, "Charles Babbage");
    }

    #[test]
    fn test_no_anchor_keeps_everyone() {
        let scholar = record(Provider::Scholar, vec![author("Ada Lovelace"), author("Grace Hopper")]);
        let resolved = resolve_authors(&[scholar], UnmatchedAuthorPolicy::Exclude);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_single_author_is_corresponding() {
        let lens = record(Provider::Lens, vec![author("Ada Lovelace")]);
        let resolved = resolve_authors(&[lens], UnmatchedAuthorPolicy::Exclude);
        assert!(resolved[0].is_corresponding);
    }

    #[test]
    fn test_corresponding_filled_from_complement() {
        let lens = record(Provider::Lens, vec![author("Ada Lovelace"), author("Grace Hopper")]);
        let wos = record(
            Provider::WebOfScience,
            vec![AuthorFragment {
                is_corresponding: Some(true),
                corresponding_email: Some("grace@navy.mil".into()),
                ..author("Hopper, Grace")
            }],
        );
        let resolved = resolve_authors(&[lens, wos], UnmatchedAuthorPolicy::Exclude);
        assert!(!resolved[0].is_corresponding);
        assert!(resolved[1].is_corresponding);
        assert_eq!(resolved[1].corresponding_email.as_deref(), Some("grace@navy.mil"));
    }

    #[test]
    fn test_blank_fields_filled_from_complement() {
        let lens = record(Provider::Lens, vec![author("Alan Turing")]);
        let wos = record(
            Provider::WebOfScience,
            vec![AuthorFragment {
                first_names: Some("Alan Mathison".into()),
                last_names: Some("Turing".into()),
                ..author("Turing, Alan")
            }],
        );
        let resolved = resolve_authors(&[lens, wos], UnmatchedAuthorPolicy::Exclude);
        let a = &resolved[0].author;
        assert_eq!(a.first_names.as_deref(), Some("Alan Mathison"));
        assert_eq!(a.last_names.as_deref(), Some("Turing"));
        assert_eq!(a.initials.as_deref(), Some("AM"));
    }

    #[test]
    fn test_same_source_id_conflict_keeps_anchor() {
        let lens = record(
            Provider::Lens,
            vec![AuthorFragment {
                external_ids: vec![ExternalId::new("orcid", "0000-A")],
                ..author("Ada Lovelace")
            }],
        );
        let wos = record(
            Provider::WebOfScience,
            vec![AuthorFragment {
                external_ids: vec![ExternalId::new("orcid", "0000-B"), ExternalId::new("researcherid", "R-1")],
                ..author("Ada Lovelace")
            }],
        );
        let resolved = resolve_authors(&[wos, lens], UnmatchedAuthorPolicy::Exclude);
        let ids = &resolved[0].author.external_ids;
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].value, "0000-A");
    }

    #[test]
    fn test_affiliations_deduplicated_by_name() {
        let lens = record(
            Provider::Lens,
            vec![AuthorFragment {
                affiliations: vec![affiliation("Universidad de Antioquia")],
                ..author("Ada Lovelace")
            }],
        );
        let scopus = record(
            Provider::Scopus,
            vec![AuthorFragment {
                affiliations: vec![
                    affiliation("Grupo de Física, Universidad de Antioquia"),
                    affiliation("Universidad Nacional de Colombia"),
                ],
                ..author("Ada Lovelace")
            }],
        );
        let resolved = resolve_authors(&[lens, scopus], UnmatchedAuthorPolicy::Exclude);
        let affs = &resolved[0].affiliations;
        assert_eq!(affs.len(), 2);
        assert_eq!(affs[0].name, "Universidad de Antioquia");
        assert!(affs[0].aliases.contains("Grupo de Física, Universidad de Antioquia"));
        assert_eq!(affs[1].name, "Universidad Nacional de Colombia");
    }

    #[test]
    fn test_authors_without_names_skipped() {
        let lens = record(Provider::Lens, vec![AuthorFragment::default(), author("Ada Lovelace")]);
        let resolved = resolve_authors(&[lens], UnmatchedAuthorPolicy::Exclude);
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("append".parse::<UnmatchedAuthorPolicy>().unwrap(), UnmatchedAuthorPolicy::Append);
        assert!("keep".parse::<UnmatchedAuthorPolicy>().is_err());
    }
}
