//! Currency conversion for open-access fees

use super::{build_http_client, rate_limiter, CurrencyConverter, DirectRateLimiter};
use crate::error::EnrichmentError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Frankfurter (ECB reference rates) endpoint
pub const DEFAULT_CURRENCY_URL: &str = "https://api.frankfurter.app";

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// Converter backed by a Frankfurter-compatible `/latest` endpoint
pub struct HttpCurrencyConverter {
    client: Client,
    base_url: String,
    rate_limiter: DirectRateLimiter,
}

impl HttpCurrencyConverter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EnrichmentError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: rate_limiter(5),
        })
    }
}

#[async_trait]
impl CurrencyConverter for HttpCurrencyConverter {
    async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, EnrichmentError> {
        let from = from.trim().to_ascii_uppercase();
        let to = to.trim().to_ascii_uppercase();
        if from == to {
            return Ok(amount);
        }

        self.rate_limiter.until_ready().await;

        let url = format!("{}/latest", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("amount", amount.to_string()), ("from", from.clone()), ("to", to.clone())])
            .send()
            .await?;

        let status = response.status();
        // unknown currency codes come back as 404/422
        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(EnrichmentError::UnsupportedCurrency(from));
        }
        if !status.is_success() {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body: LatestResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::Decode(format!("currency response: {}", e)))?;

        body.rates
            .get(&to)
            .copied()
            .ok_or(EnrichmentError::UnsupportedCurrency(to))
    }
}

/// Converter over a fixed table of USD values per currency unit
#[derive(Debug, Clone, Default)]
pub struct FixedRateConverter {
    usd_per_unit: HashMap<String, f64>,
}

impl FixedRateConverter {
    pub fn new<I, S>(rates: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut usd_per_unit: HashMap<String, f64> = rates
            .into_iter()
            .filter(|(_, rate)| rate.is_finite() && *rate > 0.0)
            .map(|(code, rate)| (code.as_ref().trim().to_ascii_uppercase(), rate))
            .collect();
        usd_per_unit.insert("USD".to_string(), 1.0);
        Self { usd_per_unit }
    }

    fn rate(&self, code: &str) -> Result<f64, EnrichmentError> {
        self.usd_per_unit
            .get(code)
            .copied()
            .ok_or_else(|| EnrichmentError::UnsupportedCurrency(code.to_string()))
    }
}

#[async_trait]
impl CurrencyConverter for FixedRateConverter {
    async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, EnrichmentError> {
        let from = from.trim().to_ascii_uppercase();
        let to = to.trim().to_ascii_uppercase();
        if from == to {
            return Ok(amount);
        }
        Ok(amount * self.rate(&from)? / self.rate(&to)?)
    }
}
