//! Work-identity matching from `(title, venue, year)`
//!
//! Used to find records of the same work when the providers share no
//! identifier. Short titles must be corroborated by venue and year before
//! any comparison is attempted; boilerplate titles ("Editorial",
//! "Introduction") would otherwise match everything.

use super::cascade::{Cascade, Cutoff, Stage};
use super::normalize::{fold, normalize_title, token_count};
use super::scorers::{partial_ratio, ratio};
use once_cell::sync::Lazy;

const RATIO_THRESHOLD: f64 = 90.0;
const PARTIAL_THRESHOLD: f64 = 95.0;
const LOW_THRESHOLD: f64 = 80.0;
/// Titles need more than this many tokens to stand on their own
const MIN_TITLE_TOKENS: usize = 3;
/// Every bracket segment must be longer than this for segment comparison
const MIN_SEGMENT_CHARS: usize = 10;

/// What is known about a work for identity matching
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkKey {
    pub title: String,
    pub venue: Option<String>,
    pub year: Option<i32>,
}

impl WorkKey {
    pub fn new(title: impl Into<String>, venue: Option<String>, year: Option<i32>) -> Self {
        Self {
            title: title.into(),
            venue,
            year,
        }
    }

    /// Exact-match key over the normalized parts: `title|venue|year`
    ///
    /// Equal for citations that differ only in case, diacritics, markup or
    /// spacing.
    pub fn fingerprint(&self) -> String {
        let venue = self.venue.as_deref().map(normalize_title).unwrap_or_default();
        let year = self.year.map(|y| y.to_string()).unwrap_or_default();
        format!("{}|{}|{}", normalize_title(&self.title), venue, year)
    }
}

/// Precomputed comparison of two work keys
struct WorkPair {
    a: String,
    b: String,
    segments_a: Vec<String>,
    segments_b: Vec<String>,
    venue_and_year: bool,
    long_titles: bool,
}

fn segments(title: &str) -> Vec<String> {
    title
        .split('[')
        .map(|s| s.trim().trim_end_matches(']').trim().to_string())
        .collect()
}

impl WorkPair {
    fn new(x: &WorkKey, y: &WorkKey) -> Self {
        let a = normalize_title(&x.title);
        let b = normalize_title(&y.title);

        let venue_check = match (&x.venue, &y.venue) {
            (Some(v1), Some(v2)) if !v1.trim().is_empty() && !v2.trim().is_empty() => {
                partial_ratio(&fold(v1), &fold(v2)) > RATIO_THRESHOLD
            }
            _ => false,
        };
        let year_check = matches!((x.year, y.year), (Some(y1), Some(y2)) if y1 == y2);

        Self {
            segments_a: segments(&a),
            segments_b: segments(&b),
            long_titles: token_count(&a) > MIN_TITLE_TOKENS && token_count(&b) > MIN_TITLE_TOKENS,
            venue_and_year: venue_check && year_check,
            a,
            b,
        }
    }

    fn comparable(&self) -> bool {
        self.long_titles || self.venue_and_year
    }

    fn long_titles(&self) -> bool {
        self.long_titles
    }

    fn venue_and_year(&self) -> bool {
        self.venue_and_year
    }

    fn segmentable(&self) -> bool {
        let long_enough = |segs: &[String]| segs.iter().all(|s| s.chars().count() > MIN_SEGMENT_CHARS);
        long_enough(&self.segments_a) && long_enough(&self.segments_b)
    }

    fn segmentable_and_corroborated(&self) -> bool {
        self.segmentable() && self.venue_and_year
    }

    fn best_segment(&self, scorer: fn(&str, &str) -> f64) -> f64 {
        self.segments_a
            .iter()
            .flat_map(|x| self.segments_b.iter().map(move |y| scorer(x, y)))
            .fold(0.0, f64::max)
    }
}

fn direct_ratio(p: &WorkPair) -> f64 {
    ratio(&p.a, &p.b)
}

fn segment_ratio(p: &WorkPair) -> f64 {
    p.best_segment(ratio)
}

fn segment_partial(p: &WorkPair) -> f64 {
    p.best_segment(partial_ratio)
}

fn whole_partial(p: &WorkPair) -> f64 {
    partial_ratio(&p.a, &p.b)
}

static WORK_CASCADE: Lazy<Cascade<WorkPair>> = Lazy::new(|| {
    Cascade::new(vec![
        Stage::new("direct_ratio", direct_ratio, Cutoff::Above(RATIO_THRESHOLD))
            .guarded(WorkPair::long_titles),
        Stage::new("segment_ratio", segment_ratio, Cutoff::Above(RATIO_THRESHOLD))
            .guarded(WorkPair::segmentable),
        Stage::new("segment_partial", segment_partial, Cutoff::Above(PARTIAL_THRESHOLD))
            .guarded(WorkPair::segmentable),
        Stage::new("segment_partial_corroborated", segment_partial, Cutoff::Above(LOW_THRESHOLD))
            .guarded(WorkPair::segmentable_and_corroborated),
        Stage::new("partial_ratio", whole_partial, Cutoff::Above(PARTIAL_THRESHOLD))
            .guarded(WorkPair::long_titles),
        Stage::new("partial_ratio_corroborated", whole_partial, Cutoff::Above(LOW_THRESHOLD))
            .guarded(WorkPair::venue_and_year),
    ])
});

/// Do two `(title, venue, year)` descriptions denote the same work?
pub fn works_match(a: &WorkKey, b: &WorkKey) -> bool {
    let pair = WorkPair::new(a, b);
    if !pair.comparable() {
        return false;
    }
    match WORK_CASCADE.evaluate(&pair) {
        Some(hit) => {
            tracing::debug!(stage = hit.label, score = hit.score, "Work identity match");
            true
        }
        None => false,
    }
}

/// Index of the first candidate describing the same work as `query`
pub fn first_work_match<'a>(
    query: &WorkKey,
    candidates: impl IntoIterator<Item = &'a WorkKey>,
) -> Option<usize> {
    candidates
        .into_iter()
        .position(|candidate| works_match(query, candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(title: &str, venue: Option<&str>, year: Option<i32>) -> WorkKey {
        WorkKey::new(title, venue.map(String::from), year)
    }

    #[test]
    fn test_fingerprint_ignores_case_and_accents() {
        let a = key("Hidrología del  Valle de Aburrá", Some("Revista EIA"), Some(2015));
        let b = key("HIDROLOGIA DEL VALLE DE ABURRA", Some("revista eia"), Some(2015));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), key("Hidrología del Valle de Aburrá", Some("Revista EIA"), None).fingerprint());
    }

    #[test]
    fn test_bracket_variant_matches_via_segments() {
        let a = key("Effects of X on Y [Efectos de X en Y]", Some("Revista Colombiana"), Some(2015));
        let b = key("Efectos de X en Y", Some("Revista Colombiana"), Some(2015));

        // the whole-string ratio alone is far below threshold
        assert!(ratio(&normalize_title(&a.title), &normalize_title(&b.title)) < RATIO_THRESHOLD);
        assert!(works_match(&a, &b));
        assert!(works_match(&b, &a));
    }

    #[test]
    fn test_identical_long_titles_match() {
        let a = key("A survey of graph theory applications", None, None);
        assert!(works_match(&a, &a.clone()));
    }

    #[test]
    fn test_short_uncorroborated_titles_rejected() {
        let a = key("Editorial", None, Some(2020));
        let b = key("Editorial", Some("Other Journal"), Some(2020));
        assert!(!works_match(&a, &b));
    }

    #[test]
    fn test_short_titles_with_venue_and_year_match() {
        let a = key("Editorial", Some("Revista Facultad de Ingeniería"), Some(2020));
        let b = key("Editorial", Some("Revista Facultad de Ingenieria"), Some(2020));
        assert!(works_match(&a, &b));
    }

    #[test]
    fn test_diacritics_and_markup_ignored() {
        let a = key("Estudio de la <i>Leishmania</i> en Antioquía, Colombia", None, None);
        let b = key("Estudio de la Leishmania en Antioquia, Colombia", None, None);
        assert!(works_match(&a, &b));
    }

    #[test]
    fn test_different_works_do_not_match() {
        let a = key("Deep learning for protein structure prediction", Some("Nature"), Some(2021));
        let b = key("Graph neural networks for traffic forecasting", Some("Nature"), Some(2021));
        assert!(!works_match(&a, &b));
    }

    #[test]
    fn test_first_work_match_position() {
        let query = key("Graph theory in social network analysis", None, None);
        let candidates = vec![
            key("Quantum chromodynamics at finite temperature", None, None),
            key("Graph theory in social network analysis", None, None),
            key("Graph theory in social network analysis", None, Some(1999)),
        ];
        assert_eq!(first_work_match(&query, &candidates), Some(1));
    }
}
