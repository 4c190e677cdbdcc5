//! Error types for kahi-etl
//!
//! Failure classes and how far each one travels:
//! - `ParseError`: one provider's raw record is malformed. Logged, and the
//!   fragment is treated as absent.
//! - `EnrichmentError`: a registry or currency lookup failed. The caller
//!   leaves the enriched fields blank.
//! - `ProcessError`: what `Pipeline::process` returns. Skips are expected
//!   outcomes; `Store` and `MissingNormalizer` are fatal for one identifier
//!   only.

use crate::types::Provider;
use thiserror::Error;
use uuid::Uuid;

/// Normalizer failure for one raw record
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Raw record is not a JSON object")]
    NotAnObject,

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a best-effort network enrichment
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned status {0}")]
    Status(u16),

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("No registry entry for {0}")]
    NotFound(String),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Best registry score {score} below threshold {threshold}")]
    LowScore { score: f64, threshold: f64 },
}

/// Why an identifier was not processed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("already present as {id}")]
    AlreadyPresent { id: Uuid },

    #[error("no provider reported data")]
    NoProviderData,

    #[error("identifier is empty or malformed")]
    InvalidIdentifier,
}

/// Outcome error of `Pipeline::process`
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Skipped: {0}")]
    Skipped(SkipReason),

    #[error("Store error: {0}")]
    Store(#[from] kahi_common::Error),

    #[error("No normalizer registered for provider {0}")]
    MissingNormalizer(Provider),
}

impl ProcessError {
    /// Fatal errors fail the identifier; skips do not
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProcessError::Skipped(_))
    }
}

impl From<sqlx::Error> for ProcessError {
    fn from(err: sqlx::Error) -> Self {
        ProcessError::Store(kahi_common::Error::Database(err))
    }
}
