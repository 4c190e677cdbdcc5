//! Coarse language detection for titles
//!
//! Script ranges decide non-Latin text. Latin text is scored by stopword
//! hits plus a few language-specific letters. Titles are short, so this
//! only needs to separate the handful of languages the providers publish
//! in; anything undecided falls back to English.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// ISO 639-1 code used when nothing better can be said
pub const DEFAULT_LANG: &str = "en";

static STOPWORDS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
    m.insert(
        "en",
        &["the", "of", "and", "in", "on", "for", "with", "to", "a", "an", "from", "by", "is", "at"],
    );
    m.insert(
        "es",
        &["el", "la", "los", "las", "de", "del", "en", "y", "con", "para", "por", "una", "un", "sobre"],
    );
    m.insert(
        "pt",
        &["o", "os", "as", "do", "da", "dos", "das", "em", "e", "com", "para", "uma", "um", "no", "na"],
    );
    m.insert(
        "fr",
        &["le", "les", "des", "du", "et", "dans", "pour", "sur", "avec", "une", "au", "aux"],
    );
    m.insert(
        "de",
        &["der", "die", "das", "und", "mit", "von", "im", "für", "den", "dem", "ein", "eine", "zur"],
    );
    m.insert(
        "it",
        &["il", "lo", "gli", "della", "delle", "di", "nel", "con", "per", "una", "degli", "sul"],
    );
    m
});

/// Detect the language of `text` as an ISO 639-1 code
///
/// Returns `None` for text with no letters.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let mut latin = 0usize;
    let mut script: HashMap<&'static str, usize> = HashMap::new();
    let mut marks: HashMap<&'static str, usize> = HashMap::new();

    for c in text.chars().filter(|c| c.is_alphabetic()) {
        let lang = match c {
            '\u{4e00}'..='\u{9fff}' => Some("zh"),
            '\u{3040}'..='\u{30ff}' => Some("ja"),
            '\u{ac00}'..='\u{d7af}' => Some("ko"),
            '\u{0600}'..='\u{06ff}' => Some("ar"),
            '\u{0590}'..='\u{05ff}' => Some("he"),
            '\u{0400}'..='\u{04ff}' => Some("ru"),
            _ => None,
        };
        match lang {
            Some(l) => *script.entry(l).or_default() += 1,
            None => {
                latin += 1;
                let mark = match c {
                    'ñ' | 'Ñ' | '¿' | '¡' => Some("es"),
                    'ã' | 'õ' | 'Ã' | 'Õ' => Some("pt"),
                    'ß' | 'ä' | 'ö' | 'ü' | 'Ä' | 'Ö' | 'Ü' => Some("de"),
                    'è' | 'ê' | 'ë' | 'î' | 'ï' | 'û' | 'ù' | 'œ' => Some("fr"),
                    _ => None,
                };
                if let Some(m) = mark {
                    *marks.entry(m).or_default() += 1;
                }
            }
        }
    }

    if latin == 0 && script.is_empty() {
        return None;
    }

    if let Some((&lang, &count)) = script.iter().max_by_key(|(_, &c)| c) {
        if count >= latin {
            // Kanji is shared with Chinese; any kana means Japanese
            if lang == "zh" && script.contains_key("ja") {
                return Some("ja");
            }
            return Some(lang);
        }
    }

    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
        .collect();

    let mut best = (DEFAULT_LANG, 0usize);
    // Fixed order keeps ties deterministic
    for lang in ["en", "es", "pt", "fr", "de", "it"] {
        let words = STOPWORDS.get(lang).copied().unwrap_or(&[]);
        let hits = tokens.iter().filter(|t| words.contains(t)).count() * 2
            + marks.get(lang).copied().unwrap_or(0) * 3;
        if hits > best.1 {
            best = (lang, hits);
        }
    }

    Some(best.0)
}
