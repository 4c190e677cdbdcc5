//! ROR (Research Organization Registry) affiliation lookup

use super::{build_http_client, rate_limiter, DirectRateLimiter, InstitutionRegistry, RegistryItem, RegistryResponse};
use crate::error::EnrichmentError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_ROR_URL: &str = "https://api.ror.org";

#[derive(Debug, Deserialize)]
struct RorResponse {
    number_of_results: usize,
    #[serde(default)]
    items: Vec<RorItem>,
}

#[derive(Debug, Deserialize)]
struct RorItem {
    score: f64,
    organization: RorOrganization,
}

#[derive(Debug, Deserialize)]
struct RorOrganization {
    id: String,
    name: Option<String>,
    #[serde(default)]
    external_ids: RorExternalIds,
}

#[derive(Debug, Default, Deserialize)]
struct RorExternalIds {
    #[serde(rename = "GRID")]
    grid: Option<RorGrid>,
}

#[derive(Debug, Deserialize)]
struct RorGrid {
    preferred: Option<String>,
}

impl From<RorResponse> for RegistryResponse {
    fn from(response: RorResponse) -> Self {
        RegistryResponse {
            count: response.number_of_results,
            items: response
                .items
                .into_iter()
                .map(|item| RegistryItem {
                    score: item.score,
                    id: item.organization.id,
                    preferred_id: item.organization.external_ids.grid.and_then(|g| g.preferred),
                    name: item.organization.name,
                })
                .collect(),
        }
    }
}

/// ROR affiliation-matching client, rate limited
pub struct RorClient {
    client: Client,
    base_url: String,
    rate_limiter: DirectRateLimiter,
}

impl RorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EnrichmentError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            // ROR asks for no more than 2000 requests per 5 minutes
            rate_limiter: rate_limiter(6),
        })
    }
}

#[async_trait]
impl InstitutionRegistry for RorClient {
    async fn lookup(&self, name: &str) -> Result<RegistryResponse, EnrichmentError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/organizations", self.base_url);
        tracing::debug!(name = %name, "Querying ROR affiliation match");

        let response = self
            .client
            .get(&url)
            .query(&[("affiliation", name)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body: RorResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::Decode(format!("ROR response: {}", e)))?;

        Ok(body.into())
    }
}
