//! Core types for the Kahi ETL engine
//!
//! Two families of records live here:
//! - **Fragments**: one provider's normalized but unmerged view of a work,
//!   its authors/affiliations and its venue. Every field is optional.
//! - **Canonical records**: the merged `Work`, `Author`, `Institution` and
//!   `Venue` that the linker persists and patches.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Providers
// ============================================================================

/// Bibliographic data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Lens,
    #[serde(rename = "wos")]
    WebOfScience,
    Scielo,
    Scopus,
    Scholar,
    Oadoi,
    Doaj,
}

/// What a provider is authoritative for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRole {
    /// Curated index with full bibliographic records
    IndexOfRecord,
    /// Abstracting/aggregating service
    Aggregator,
    /// Only contributes citation counts
    CitationTracker,
    /// Only contributes open-access status
    OpenAccessResolver,
    /// Journal-level open-access registry (venue enrichment)
    Registry,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Provider::Lens,
        Provider::WebOfScience,
        Provider::Scielo,
        Provider::Scopus,
        Provider::Scholar,
        Provider::Oadoi,
        Provider::Doaj,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Lens => "lens",
            Provider::WebOfScience => "wos",
            Provider::Scielo => "scielo",
            Provider::Scopus => "scopus",
            Provider::Scholar => "scholar",
            Provider::Oadoi => "oadoi",
            Provider::Doaj => "doaj",
        }
    }

    pub fn role(&self) -> ProviderRole {
        match self {
            Provider::Lens | Provider::WebOfScience => ProviderRole::IndexOfRecord,
            Provider::Scielo | Provider::Scopus => ProviderRole::Aggregator,
            Provider::Scholar => ProviderRole::CitationTracker,
            Provider::Oadoi => ProviderRole::OpenAccessResolver,
            Provider::Doaj => ProviderRole::Registry,
        }
    }

    /// Scalar field precedence; higher wins
    ///
    /// Index-of-record providers come first, then aggregators, then the
    /// single-purpose providers.
    pub fn priority(&self) -> u8 {
        match self {
            Provider::Lens => 70,
            Provider::WebOfScience => 60,
            Provider::Scielo => 50,
            Provider::Scopus => 40,
            Provider::Scholar => 20,
            Provider::Oadoi => 10,
            Provider::Doaj => 5,
        }
    }

    /// Rank as author anchor (lower is preferred); `None` if the provider
    /// never anchors the author list
    pub fn anchor_rank(&self) -> Option<u8> {
        match self {
            Provider::Lens => Some(0),
            Provider::WebOfScience => Some(1),
            Provider::Scielo => Some(2),
            Provider::Scopus => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lens" => Ok(Provider::Lens),
            "wos" | "webofscience" | "web_of_science" => Ok(Provider::WebOfScience),
            "scielo" => Ok(Provider::Scielo),
            "scopus" => Ok(Provider::Scopus),
            "scholar" => Ok(Provider::Scholar),
            "oadoi" | "unpaywall" => Ok(Provider::Oadoi),
            "doaj" => Ok(Provider::Doaj),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

// ============================================================================
// Shared value types
// ============================================================================

/// `(source, value)` identifier in one namespace (DOI, ORCID, ISSN, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalId {
    pub source: String,
    pub value: String,
}

impl ExternalId {
    /// Build an id; DOI values are lowercased
    pub fn new(source: impl Into<String>, value: impl Into<String>) -> Self {
        let source = source.into().trim().to_ascii_lowercase();
        let value = value.into().trim().to_string();
        let value = if source == "doi" {
            normalize_doi(&value)
        } else {
            value
        };
        Self { source, value }
    }

    pub fn doi(value: &str) -> Self {
        Self::new("doi", value)
    }

    pub fn is_doi(&self) -> bool {
        self.source == "doi"
    }
}

/// Lowercase a DOI and drop resolver prefixes
pub fn normalize_doi(doi: &str) -> String {
    let doi = doi.trim().to_lowercase();
    for prefix in ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "http://dx.doi.org/", "doi:"] {
        if let Some(rest) = doi.strip_prefix(prefix) {
            return rest.trim().to_string();
        }
    }
    doi
}

/// Title in one language with its lowercase index key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    pub title: String,
    pub title_idx: String,
    pub lang: String,
}

impl Title {
    pub fn new(title: impl Into<String>, lang: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            title_idx: title.to_lowercase(),
            title,
            lang: lang.into(),
        }
    }
}

/// Provenance entry: which provider was consulted, when (epoch seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChecked {
    pub source: Provider,
    pub ts: i64,
}

/// Declared type of a serial number; unrecognized types read as `Unknown`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SerialKind {
    Pissn,
    Eissn,
    Issn,
    Isbn,
    Unknown,
}

impl SerialKind {
    /// Anything but `Unknown`
    pub fn is_specific(&self) -> bool {
        !matches!(self, SerialKind::Unknown)
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pissn" | "print" | "issn_print" => SerialKind::Pissn,
            "eissn" | "electronic" | "issn_electronic" => SerialKind::Eissn,
            "issn" => SerialKind::Issn,
            "isbn" => SerialKind::Isbn,
            _ => SerialKind::Unknown,
        }
    }
}

impl From<String> for SerialKind {
    fn from(s: String) -> Self {
        SerialKind::parse(&s)
    }
}

/// Serial number (ISSN/ISBN) stored dash-stripped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Serial {
    #[serde(rename = "type")]
    pub kind: SerialKind,
    pub value: String,
    /// Other types providers declared for the same value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_declared: Vec<SerialKind>,
}

impl Serial {
    pub fn new(kind: SerialKind, value: &str) -> Self {
        Self {
            kind,
            value: normalize_serial(value),
            also_declared: Vec::new(),
        }
    }

    /// `XXXX-XXXX` form for ISSN registry lookups; `None` unless 8 chars
    pub fn issn_dashed(&self) -> Option<String> {
        let v = &self.value;
        if v.len() == 8 && v.is_ascii() {
            Some(format!("{}-{}", &v[..4], &v[4..]))
        } else {
            None
        }
    }
}

/// Strip dashes and whitespace; uppercase the ISSN check digit `X`
pub fn normalize_serial(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Venue abbreviation, e.g. ISO or JCR abbreviated title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abbreviation {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Postal address of an institution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

/// Set of name spellings: case-insensitive membership, original casing kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasSet(Vec<String>);

impl AliasSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, name: &str) -> bool {
        let key = alias_key(name);
        self.0.iter().any(|a| alias_key(a) == key)
    }

    /// Insert unless blank or already present; returns whether inserted
    pub fn insert(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.contains(name) {
            return false;
        }
        self.0.push(name.to_string());
        true
    }

    pub fn extend<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.insert(name);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercased keys used by the alias lookup index
    pub fn keys(&self) -> Vec<String> {
        self.0.iter().map(|a| alias_key(a)).collect()
    }
}

impl<'a> FromIterator<&'a str> for AliasSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = AliasSet::new();
        set.extend(iter);
        set
    }
}

/// Membership key for alias comparison
pub fn alias_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Non-blank view of an optional string
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Trim, mapping blank to `None`
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// Provider fragments
// ============================================================================

/// Title as reported by a provider; language may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleFragment {
    pub title: String,
    pub lang: Option<String>,
}

/// One provider's document fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentFragment {
    pub titles: Vec<TitleFragment>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub publication_type: Option<String>,
    pub start_page: Option<String>,
    pub end_page: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub year_published: Option<i32>,
    pub date_published: Option<i64>,
    pub languages: Vec<String>,
    pub funding_organization: Option<String>,
    pub funding_details: Option<String>,
    pub references_count: Option<u32>,
    pub citations_count: Option<u32>,
    pub citations_link: Option<String>,
    pub is_open_access: Option<bool>,
    pub open_access_status: Option<String>,
    pub external_ids: Vec<ExternalId>,
    pub keywords: Vec<String>,
    pub subjects: Vec<String>,
    pub urls: Vec<String>,
    pub bibtex: Option<String>,
}

/// One provider's view of an institution an author is affiliated with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffiliationFragment {
    pub name: Option<String>,
    pub aliases: Vec<String>,
    pub abbreviations: Vec<String>,
    pub types: Vec<String>,
    pub addresses: Vec<Address>,
    pub external_ids: Vec<ExternalId>,
    pub external_urls: Vec<String>,
}

/// One provider's view of an author of the work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorFragment {
    pub full_name: Option<String>,
    pub first_names: Option<String>,
    pub last_names: Option<String>,
    pub initials: Option<String>,
    pub aliases: Vec<String>,
    pub external_ids: Vec<ExternalId>,
    pub keywords: Vec<String>,
    pub is_corresponding: Option<bool>,
    pub corresponding_email: Option<String>,
    pub corresponding_address: Option<String>,
    pub affiliations: Vec<AffiliationFragment>,
}

impl AuthorFragment {
    /// Name used for matching: full name, else "first last"
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = non_blank(&self.full_name) {
            return Some(name.to_string());
        }
        let parts: Vec<&str> = [non_blank(&self.first_names), non_blank(&self.last_names)]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// One provider's view of the venue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueFragment {
    pub title: Option<String>,
    pub publication_type: Option<String>,
    pub publisher: Option<String>,
    pub country: Option<String>,
    pub institution: Option<String>,
    pub serials: Vec<Serial>,
    pub abbreviations: Vec<Abbreviation>,
    pub aliases: Vec<String>,
    pub external_ids: Vec<ExternalId>,
    pub external_urls: Vec<String>,
    pub subjects: Vec<String>,
    pub keywords: Vec<String>,
    pub languages: Vec<String>,
}

/// Normalizer output for one provider and one work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub provider: Provider,
    /// When the provider data was retrieved (epoch seconds)
    pub checked_at: i64,
    pub document: DocumentFragment,
    pub authors: Vec<AuthorFragment>,
    pub venue: Option<VenueFragment>,
}

impl ProviderRecord {
    pub fn new(provider: Provider, checked_at: i64) -> Self {
        Self {
            provider,
            checked_at,
            document: DocumentFragment::default(),
            authors: Vec::new(),
            venue: None,
        }
    }
}

// ============================================================================
// Canonical records
// ============================================================================

/// Per-work reference to a canonical author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub author_id: Uuid,
    pub affiliations: Vec<Uuid>,
    pub is_corresponding: bool,
    pub corresponding_email: Option<String>,
    pub corresponding_address: Option<String>,
}

/// Canonical scholarly work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Work {
    pub updated: i64,
    pub source_checked: Vec<SourceChecked>,
    pub titles: Vec<Title>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub abstract_idx: Option<String>,
    pub publication_type: Option<String>,
    pub start_page: Option<String>,
    pub end_page: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub year_published: Option<i32>,
    pub date_published: Option<i64>,
    pub languages: Vec<String>,
    pub funding_organization: Option<String>,
    pub funding_details: Option<String>,
    pub references_count: Option<u32>,
    pub citations_count: Option<u32>,
    pub citations_link: Option<String>,
    pub is_open_access: Option<bool>,
    pub open_access_status: Option<String>,
    pub external_ids: Vec<ExternalId>,
    pub keywords: Vec<String>,
    pub subjects: Vec<String>,
    pub urls: Vec<String>,
    pub bibtex: Option<String>,
    pub authors: Vec<AuthorRef>,
    pub venue_id: Option<Uuid>,
}

impl Work {
    pub fn doi(&self) -> Option<&str> {
        self.external_ids
            .iter()
            .find(|id| id.is_doi())
            .map(|id| id.value.as_str())
    }

    /// Title in `lang`, else the first title
    pub fn title(&self, lang: Option<&str>) -> Option<&str> {
        lang.and_then(|l| self.titles.iter().find(|t| t.lang == l))
            .or_else(|| self.titles.first())
            .map(|t| t.title.as_str())
    }
}

/// Canonical author
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub updated: i64,
    pub source_checked: Vec<SourceChecked>,
    pub full_name: String,
    pub first_names: Option<String>,
    pub last_names: Option<String>,
    pub initials: Option<String>,
    pub aliases: AliasSet,
    pub external_ids: Vec<ExternalId>,
    pub keywords: Vec<String>,
    /// Institutions this author has been affiliated with across works
    pub affiliations: Vec<Uuid>,
}

/// Canonical institution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Institution {
    pub updated: i64,
    pub source_checked: Vec<SourceChecked>,
    pub name: String,
    pub aliases: AliasSet,
    pub abbreviations: Vec<String>,
    pub types: Vec<String>,
    pub addresses: Vec<Address>,
    pub external_ids: Vec<ExternalId>,
    pub external_urls: Vec<String>,
    /// External id of the record that superseded this one
    pub redirect: Option<String>,
}

/// Canonical venue (journal, series, book)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Venue {
    pub updated: i64,
    pub source_checked: Vec<SourceChecked>,
    pub title: Option<String>,
    pub title_idx: Option<String>,
    pub publication_type: Option<String>,
    pub publisher: Option<String>,
    pub publisher_idx: Option<String>,
    pub country: Option<String>,
    pub institution: Option<String>,
    pub institution_id: Option<Uuid>,
    pub serials: Vec<Serial>,
    pub abbreviations: Vec<Abbreviation>,
    pub aliases: Vec<String>,
    pub external_ids: Vec<ExternalId>,
    pub external_urls: Vec<String>,
    pub subjects: Vec<String>,
    pub keywords: Vec<String>,
    pub languages: Vec<String>,
    pub license: Vec<String>,
    pub editorial_review: Option<String>,
    pub plagiarism_detection: Option<bool>,
    pub active: Option<bool>,
    pub publication_time: Option<u32>,
    pub submission_charges: Option<f64>,
    pub submission_currency: Option<String>,
    pub submission_charges_usd: Option<f64>,
    pub apc_charges: Option<f64>,
    pub apc_currency: Option<String>,
    pub apc_charges_usd: Option<f64>,
}

impl Venue {
    /// Preferred serial for registry lookups: eissn, then pissn
    pub fn lookup_issn(&self) -> Option<String> {
        [SerialKind::Eissn, SerialKind::Pissn, SerialKind::Issn]
            .iter()
            .find_map(|kind| {
                self.serials
                    .iter()
                    .find(|s| &s.kind == kind || s.also_declared.contains(kind))
                    .and_then(Serial::issn_dashed)
            })
    }
}

/// Author entry produced by resolution, before linking
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAuthor {
    pub author: Author,
    pub affiliations: Vec<Institution>,
    pub is_corresponding: bool,
    pub corresponding_email: Option<String>,
    pub corresponding_address: Option<String>,
}

/// How a work to process is identified
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkIdentifier {
    Doi(String),
    /// No shared identifier; match staged records by work identity
    Citation {
        title: String,
        venue: Option<String>,
        year: Option<i32>,
    },
}

impl WorkIdentifier {
    pub fn doi(doi: &str) -> Self {
        WorkIdentifier::Doi(normalize_doi(doi))
    }
}

impl fmt::Display for WorkIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkIdentifier::Doi(doi) => write!(f, "doi:{}", doi),
            WorkIdentifier::Citation { title, year, .. } => match year {
                Some(y) => write!(f, "citation:{} ({})", title, y),
                None => write!(f, "citation:{}", title),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_priority_order() {
        assert!(Provider::Lens.priority() > Provider::WebOfScience.priority());
        assert!(Provider::WebOfScience.priority() > Provider::Scielo.priority());
        assert!(Provider::Scielo.priority() > Provider::Scopus.priority());
        assert!(Provider::Scopus.priority() > Provider::Scholar.priority());
    }

    #[test]
    fn test_provider_roundtrip_str() {
        for p in Provider::ALL {
            assert_eq!(p.as_str().parse::<Provider>().unwrap(), p);
        }
        assert!("crossref".parse::<Provider>().is_err());
    }

    #[test]
    fn test_provider_serde_names() {
        let json = serde_json::to_string(&Provider::WebOfScience).unwrap();
        assert_eq!(json, "\"wos\"");
    }

    #[test]
    fn test_doi_case_normalized() {
        let id = ExternalId::new("DOI", "https://doi.org/10.1000/ABC");
        assert_eq!(id.source, "doi");
        assert_eq!(id.value, "10.1000/abc");
        // non-DOI values keep their casing
        assert_eq!(ExternalId::new("scopus", "2-s2.0-ABC").value, "2-s2.0-ABC");
    }

    #[test]
    fn test_alias_set_case_insensitive() {
        let mut aliases = AliasSet::new();
        assert!(aliases.insert("John Smith"));
        assert!(!aliases.insert("JOHN  smith"));
        assert!(aliases.insert("J. Smith"));
        assert!(!aliases.insert("  "));
        assert_eq!(aliases.iter().collect::<Vec<_>>(), vec!["John Smith", "J. Smith"]);
        assert!(aliases.contains("john smith"));
    }

    #[test]
    fn test_serial_normalization() {
        let s = Serial::new(SerialKind::Pissn, "0123-456x");
        assert_eq!(s.value, "0123456X");
        assert_eq!(s.issn_dashed().as_deref(), Some("0123-456X"));
        assert_eq!(Serial::new(SerialKind::Isbn, "978-3-16-148410-0").issn_dashed(), None);
    }

    #[test]
    fn test_serial_kind_tolerates_unknown_types() {
        let s: Serial = serde_json::from_value(serde_json::json!({"type": "Print ISSN", "value": "1"})).unwrap();
        assert_eq!(s.kind, SerialKind::Unknown);
        let s: Serial = serde_json::from_value(serde_json::json!({"type": "eissn", "value": "2"})).unwrap();
        assert_eq!(s.kind, SerialKind::Eissn);
        assert_eq!(serde_json::to_value(&s).unwrap()["type"], "eissn");
    }

    #[test]
    fn test_venue_prefers_eissn() {
        let venue = Venue {
            serials: vec![
                Serial::new(SerialKind::Pissn, "1111-1111"),
                Serial::new(SerialKind::Eissn, "2222-2222"),
            ],
            ..Default::default()
        };
        assert_eq!(venue.lookup_issn().as_deref(), Some("2222-2222"));
    }

    #[test]
    fn test_author_display_name_fallback() {
        let author = AuthorFragment {
            first_names: Some("Alan".into()),
            last_names: Some("Turing".into()),
            ..Default::default()
        };
        assert_eq!(author.display_name().as_deref(), Some("Alan Turing"));
        assert_eq!(AuthorFragment::default().display_name(), None);
    }
}
