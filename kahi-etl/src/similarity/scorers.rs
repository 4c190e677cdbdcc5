//! String similarity scorers on a 0-100 scale
//!
//! All scorers are symmetric in their arguments and return 100 for two
//! identical non-empty strings.

use std::collections::BTreeSet;

/// Full-string ratio: `100 * (1 - levenshtein / max_len)`
pub fn ratio(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let max_len = len_a.max(len_b);
    if max_len == 0 {
        return if a == b { 100.0 } else { 0.0 };
    }
    let distance = strsim::levenshtein(a, b);
    100.0 * (1.0 - distance as f64 / max_len as f64)
}

/// Best ratio of the shorter string against every equal-length window of
/// the longer one
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };

    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }
    if short.len() == long.len() {
        return ratio(a, b);
    }

    let needle: String = short.iter().collect();
    let mut best = 0.0_f64;
    for start in 0..=(long.len() - short.len()) {
        let window: String = long[start..start + short.len()].iter().collect();
        let score = ratio(&needle, &window);
        if score > best {
            best = score;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

/// Sorted unique tokens
fn token_set(text: &str) -> BTreeSet<&str> {
    text.split_whitespace().collect()
}

fn join(tokens: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    tokens
        .into_iter()
        .map(|t| t.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pieces used by the token-set scorers: shared tokens, shared + rest of a,
/// shared + rest of b
fn token_set_parts(a: &str, b: &str) -> (String, String, String) {
    let set_a = token_set(a);
    let set_b = token_set(b);
    let common = join(set_a.intersection(&set_b));
    let rest_a = join(set_a.difference(&set_b));
    let rest_b = join(set_b.difference(&set_a));

    let combine = |rest: &str| {
        if common.is_empty() {
            rest.to_string()
        } else if rest.is_empty() {
            common.clone()
        } else {
            format!("{} {}", common, rest)
        }
    };

    let with_a = combine(&rest_a);
    let with_b = combine(&rest_b);
    (common, with_a, with_b)
}

/// Token-set ratio: insensitive to word order and repeated words
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let (common, with_a, with_b) = token_set_parts(a, b);
    let mut best = ratio(&with_a, &with_b);
    if !common.is_empty() {
        best = best.max(ratio(&common, &with_a)).max(ratio(&common, &with_b));
    }
    best
}
