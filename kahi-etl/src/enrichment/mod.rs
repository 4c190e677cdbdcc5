//! Best-effort enrichment collaborators
//!
//! Network lookups used while merging and linking: the institution
//! registry (ROR), the open-access journal registry (DOAJ) and currency
//! conversion. Every call returns `Result<_, EnrichmentError>`; callers map
//! errors to "leave blank" and log them, nothing here aborts a pipeline.

pub mod currency;
pub mod doaj;
pub mod ror;

pub use currency::{FixedRateConverter, HttpCurrencyConverter};
pub use doaj::{DoajClient, StagedOpenAccessRegistry};
pub use ror::RorClient;

use crate::error::EnrichmentError;
use crate::types::{Abbreviation, Serial};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

/// User-Agent sent to every external service
pub const USER_AGENT: &str = concat!("kahi-etl/", env!("CARGO_PKG_VERSION"));

/// Direct (unkeyed) token-bucket limiter shared by the HTTP clients
pub type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// HTTP client with total and connect timeouts
pub fn build_http_client(timeout: Duration) -> Result<Client, EnrichmentError> {
    Ok(Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .user_agent(USER_AGENT)
        .build()?)
}

/// Limiter allowing `per_second` requests per second (at least one)
pub fn rate_limiter(per_second: u32) -> DirectRateLimiter {
    RateLimiter::direct(Quota::per_second(
        NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN),
    ))
}

// ============================================================================
// Institution registry
// ============================================================================

/// One candidate organization returned by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryItem {
    /// Match confidence, 0.0-1.0
    pub score: f64,
    /// Registry identifier (e.g. ROR URL)
    pub id: String,
    /// Preferred cross-registry identifier (e.g. GRID)
    pub preferred_id: Option<String>,
    pub name: Option<String>,
}

/// Registry answer for a name lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryResponse {
    pub count: usize,
    pub items: Vec<RegistryItem>,
}

impl RegistryResponse {
    /// The top item if it scores strictly above `threshold`
    pub fn usable_hit(&self, threshold: f64) -> Result<&RegistryItem, EnrichmentError> {
        let top = self
            .items
            .first()
            .filter(|_| self.count > 0)
            .ok_or_else(|| EnrichmentError::NotFound("registry returned no items".to_string()))?;
        if top.score > threshold {
            Ok(top)
        } else {
            Err(EnrichmentError::LowScore {
                score: top.score,
                threshold,
            })
        }
    }
}

/// Name lookup against a global research-organization registry
#[async_trait]
pub trait InstitutionRegistry: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<RegistryResponse, EnrichmentError>;
}

// ============================================================================
// Open-access journal registry
// ============================================================================

/// Journal-level data from the open-access registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAccessJournal {
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub country: Option<String>,
    pub institution: Option<String>,
    pub serials: Vec<Serial>,
    pub abbreviations: Vec<Abbreviation>,
    pub aliases: Vec<String>,
    pub subjects: Vec<String>,
    pub keywords: Vec<String>,
    pub languages: Vec<String>,
    pub license: Vec<String>,
    pub external_urls: Vec<String>,
    pub editorial_review: Option<String>,
    pub plagiarism_detection: Option<bool>,
    pub active: Option<bool>,
    pub publication_time: Option<u32>,
    pub submission_charges: Option<f64>,
    pub submission_currency: Option<String>,
    pub apc_charges: Option<f64>,
    pub apc_currency: Option<String>,
}

/// Lookup by ISSN in `XXXX-XXXX` form
#[async_trait]
pub trait OpenAccessRegistry: Send + Sync {
    async fn lookup_issn(&self, issn: &str) -> Result<OpenAccessJournal, EnrichmentError>;
}

// ============================================================================
// Currency conversion
// ============================================================================

#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Convert `amount` from `from` into `to` (ISO 4217 codes)
    async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, EnrichmentError>;
}
