//! Provider normalizers: raw provider JSON to `ProviderRecord`
//!
//! A normalizer is a pure function of one raw record. Missing keys map to
//! the field's empty value; only values of the wrong shape are errors.

pub mod canonical;
pub mod doaj;
pub mod oadoi;
pub mod scholar;

pub use canonical::CanonicalJsonNormalizer;
pub use doaj::{parse_journal, DoajNormalizer};
pub use oadoi::OadoiNormalizer;
pub use scholar::ScholarNormalizer;

use crate::error::ParseError;
use crate::types::{Provider, ProviderRecord};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Turns one provider's raw record into a fragment tuple
pub trait Normalizer: Send + Sync {
    fn provider(&self) -> Provider;

    fn parse(&self, raw: &Value, checked_at: i64) -> Result<ProviderRecord, ParseError>;
}

/// Normalizers by provider
pub struct NormalizerRegistry {
    normalizers: HashMap<Provider, Box<dyn Normalizer>>,
}

impl NormalizerRegistry {
    pub fn empty() -> Self {
        Self {
            normalizers: HashMap::new(),
        }
    }

    /// Native normalizers for Scholar, oaDOI and DOAJ; canonical JSON for
    /// the index and aggregator providers
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for provider in [Provider::Lens, Provider::WebOfScience, Provider::Scielo, Provider::Scopus] {
            registry.register(Box::new(CanonicalJsonNormalizer::new(provider)));
        }
        registry.register(Box::new(ScholarNormalizer));
        registry.register(Box::new(OadoiNormalizer));
        registry.register(Box::new(DoajNormalizer));
        registry
    }

    /// Register a normalizer, replacing any previous one for its provider
    pub fn register(&mut self, normalizer: Box<dyn Normalizer>) {
        self.normalizers.insert(normalizer.provider(), normalizer);
    }

    pub fn get(&self, provider: Provider) -> Option<&dyn Normalizer> {
        self.normalizers.get(&provider).map(|n| n.as_ref())
    }
}

impl Default for NormalizerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// Tolerant field readers
// ============================================================================

pub(crate) fn as_object(raw: &Value) -> Result<&Map<String, Value>, ParseError> {
    raw.as_object().ok_or(ParseError::NotAnObject)
}

fn invalid(field: &str, reason: impl Into<String>) -> ParseError {
    ParseError::InvalidField {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// String (or number rendered as string); blank and null are `None`
pub(crate) fn text(obj: &Map<String, Value>, field: &str) -> Option<String> {
    match obj.get(field)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-negative count given as number or numeric string
pub(crate) fn count(obj: &Map<String, Value>, field: &str) -> Result<Option<u32>, ParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| invalid(field, format!("not a count: {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| invalid(field, format!("not a count: {:?}", s))),
        Some(other) => Err(invalid(field, format!("unexpected value {}", other))),
    }
}

/// Decimal amount given as number or numeric string
pub(crate) fn amount(obj: &Map<String, Value>, field: &str) -> Result<Option<f64>, ParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(field, format!("not an amount: {:?}", s))),
        Some(other) => Err(invalid(field, format!("unexpected value {}", other))),
    }
}

/// Boolean given as bool, 0/1, or "true"/"false"/"yes"/"no"
pub(crate) fn flag(obj: &Map<String, Value>, field: &str) -> Result<Option<bool>, ParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::Number(n)) => Ok(n.as_i64().map(|v| v != 0)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            other => Err(invalid(field, format!("not a flag: {:?}", other))),
        },
        Some(other) => Err(invalid(field, format!("unexpected value {}", other))),
    }
}

/// List of strings; a lone string becomes a one-element list
pub(crate) fn strings(obj: &Map<String, Value>, field: &str) -> Vec<String> {
    match obj.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}
