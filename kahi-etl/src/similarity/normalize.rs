//! Text normalization ahead of scoring

use deunicode::deunicode;
use once_cell::sync::Lazy;
use regex::Regex;

static LATEX_COMMAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\\w+").expect("valid regex"));
static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("valid regex"));
static MATH_SYMBOLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$_^{}]").expect("valid regex"));

/// Strip diacritics and lowercase
pub fn fold(text: &str) -> String {
    deunicode(text).to_lowercase()
}

/// Collapse runs of whitespace into single spaces
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a title for work-identity comparison
///
/// Folds case and diacritics, then removes markup tags, LaTeX commands
/// and math delimiters. Brackets survive: they separate
/// alternate-language variants.
pub fn normalize_title(title: &str) -> String {
    let text = MARKUP_TAG.replace_all(title, " ");
    let text = fold(&text);
    let text = LATEX_COMMAND.replace_all(&text, "");
    let text = MATH_SYMBOLS.replace_all(&text, "");
    squash_whitespace(&text)
}

/// Normalize a person or organization name
///
/// Anything that is not a letter or digit becomes a separator.
pub fn normalize_name(name: &str) -> String {
    let folded = fold(name);
    let cleaned: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    squash_whitespace(&cleaned)
}

/// Reduce every token but the last to its initial: "alan m turing" -> "a m turing"
///
/// Expects output of `normalize_name`.
pub fn initials_form(normalized: &str) -> String {
    let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
    match tokens.split_last() {
        Some((last, given)) => given
            .iter()
            .filter_map(|t| t.chars().next())
            .map(String::from)
            .chain(std::iter::once(last.to_string()))
            .collect::<Vec<_>>()
            .join(" "),
        None => String::new(),
    }
}

/// Count whitespace-separated tokens
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}
