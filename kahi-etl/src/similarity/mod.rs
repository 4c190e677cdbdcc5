//! Similarity engine
//!
//! Pure and stateless. Two matching tasks share the scorers in `scorers`
//! and the stage combinator in `cascade`:
//! - name matching for authors and institutions (`AUTHOR_NAMES`,
//!   `AFFILIATION_NAMES`)
//! - work identity when no identifier is shared (`work_identity`)

pub mod cascade;
pub mod normalize;
pub mod scorers;
pub mod work_identity;

use cascade::{Cascade, Cutoff, Stage, StageHit};
use normalize::{initials_form, normalize_name};
use once_cell::sync::Lazy;
use scorers::{partial_ratio, ratio, token_set_ratio};

pub use work_identity::{first_work_match, works_match, WorkKey};

/// Two names, already normalized
pub struct NamePair {
    a: String,
    b: String,
}

impl NamePair {
    pub fn new(a: &str, b: &str) -> Self {
        Self {
            a: normalize_name(a),
            b: normalize_name(b),
        }
    }

    /// Person names: "Last, First" is read as "First Last"
    pub fn people(a: &str, b: &str) -> Self {
        Self::new(&natural_order(a), &natural_order(b))
    }

    fn both_present(&self) -> bool {
        !self.a.is_empty() && !self.b.is_empty()
    }
}

fn natural_order(name: &str) -> String {
    let mut parts = name.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(last), Some(first), None) if !first.trim().is_empty() => {
            format!("{} {}", first.trim(), last.trim())
        }
        _ => name.to_string(),
    }
}

fn full(p: &NamePair) -> f64 {
    ratio(&p.a, &p.b)
}

fn substring(p: &NamePair) -> f64 {
    partial_ratio(&p.a, &p.b)
}

fn token_set(p: &NamePair) -> f64 {
    token_set_ratio(&p.a, &p.b)
}

fn initials(p: &NamePair) -> f64 {
    ratio(&initials_form(&p.a), &initials_form(&p.b))
}

/// Lower bound on the previous score before a fallback stage runs
pub const NAME_GATE: f64 = 45.0;

/// Candidate selected by a cascade; short-lived, never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate<T> {
    pub candidate: T,
    pub score: f64,
    pub matched_on: &'static str,
}

/// A name cascade plus how its inputs are read
pub struct NameMatcher {
    cascade: Cascade<NamePair>,
    person_names: bool,
}

impl NameMatcher {
    fn pair(&self, a: &str, b: &str) -> NamePair {
        if self.person_names {
            NamePair::people(a, b)
        } else {
            NamePair::new(a, b)
        }
    }

    pub fn evaluate(&self, a: &str, b: &str) -> Option<StageHit> {
        self.cascade.evaluate(&self.pair(a, b))
    }

    /// First candidate that matches `query`, in candidate order
    pub fn first_match<T>(
        &self,
        query: &str,
        candidates: impl IntoIterator<Item = (T, String)>,
    ) -> Option<MatchCandidate<T>> {
        candidates.into_iter().find_map(|(candidate, name)| {
            self.evaluate(query, &name).map(|hit| MatchCandidate {
                candidate,
                score: hit.score,
                matched_on: hit.label,
            })
        })
    }

    /// Best candidate for `query`: earliest stage wins, then highest score,
    /// then candidate order
    pub fn best_match<T>(
        &self,
        query: &str,
        candidates: impl IntoIterator<Item = (T, String)>,
    ) -> Option<MatchCandidate<T>> {
        let mut best: Option<(usize, MatchCandidate<T>)> = None;

        for (candidate, name) in candidates {
            let Some(hit) = self.evaluate(query, &name) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((stage, current)) => {
                    hit.stage < *stage || (hit.stage == *stage && hit.score > current.score)
                }
            };
            if better {
                best = Some((
                    hit.stage,
                    MatchCandidate {
                        candidate,
                        score: hit.score,
                        matched_on: hit.label,
                    },
                ));
            }
        }

        best.map(|(_, m)| m)
    }
}

/// Person-name cascade: full ratio, substring, token set, then initials
///
/// The initials stage catches "A. Turing" vs "Alan Turing"; it only runs
/// when the token-set score already cleared the gate.
pub static AUTHOR_NAMES: Lazy<NameMatcher> = Lazy::new(|| NameMatcher {
    cascade: Cascade::new(vec![
        Stage::new("full_ratio", full, Cutoff::AtLeast(90.0)).guarded(NamePair::both_present),
        Stage::new("substring_ratio", substring, Cutoff::AtLeast(90.0))
            .gated(NAME_GATE)
            .guarded(NamePair::both_present),
        Stage::new("token_set_ratio", token_set, Cutoff::AtLeast(90.0))
            .gated(NAME_GATE)
            .guarded(NamePair::both_present),
        Stage::new("initials_ratio", initials, Cutoff::AtLeast(90.0))
            .gated(NAME_GATE)
            .guarded(NamePair::both_present),
    ]),
    person_names: true,
});

/// Institution-name cascade: same stages as for people, thresholds at 80
pub static AFFILIATION_NAMES: Lazy<NameMatcher> = Lazy::new(|| NameMatcher {
    cascade: Cascade::new(vec![
        Stage::new("full_ratio", full, Cutoff::AtLeast(80.0)).guarded(NamePair::both_present),
        Stage::new("substring_ratio", substring, Cutoff::AtLeast(80.0))
            .gated(NAME_GATE)
            .guarded(NamePair::both_present),
        Stage::new("token_set_ratio", token_set, Cutoff::AtLeast(80.0))
            .gated(NAME_GATE)
            .guarded(NamePair::both_present),
    ]),
    person_names: false,
});

/// Do two person names denote the same author?
pub fn match_names(a: &str, b: &str) -> Option<StageHit> {
    AUTHOR_NAMES.evaluate(a, b)
}

/// Do two institution names denote the same organization?
pub fn match_affiliations(a: &str, b: &str) -> Option<StageHit> {
    AFFILIATION_NAMES.evaluate(a, b)
}
