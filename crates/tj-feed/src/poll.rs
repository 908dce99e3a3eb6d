//! Polled quote sources.
//!
//! [`QuoteFetcher`] is the capability the aggregator's polling loop runs
//! against; [`GoldApiFetcher`] is the production implementation hitting the
//! gold-api.com REST endpoint. Tests inject their own fetcher.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One observation from a request/response quote provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PolledQuote {
    pub price: f64,
    pub updated_at: DateTime<Utc>,
}

/// A request/response price provider: symbol in, latest price out.
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    async fn fetch(&self, symbol: &str) -> Result<PolledQuote>;
}

/// REST client for `https://api.gold-api.com/price/<METAL>`.
pub struct GoldApiFetcher {
    client: reqwest::Client,
    base_url: String,
}

/// Wire shape of the gold-api price response.
#[derive(Debug, Deserialize)]
struct GoldApiResponse {
    price: f64,
    #[serde(rename = "updatedAt")]
    updated_at: Option<String>,
}

impl GoldApiFetcher {
    pub fn new(base_url: String) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }
}

/// Map a journal symbol to the provider's metal code: `XAUUSD` -> `XAU`.
fn metal_code(symbol: &str) -> &str {
    symbol.strip_suffix("USD").unwrap_or(symbol)
}

#[async_trait]
impl QuoteFetcher for GoldApiFetcher {
    async fn fetch(&self, symbol: &str) -> Result<PolledQuote> {
        let url = format!("{}/price/{}", self.base_url, metal_code(symbol));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()?;
        let body: GoldApiResponse =
            response.json().await.with_context(|| format!("malformed payload from {url}"))?;

        // The provider timestamp is advisory; fall back to observation time.
        let updated_at = body
            .updated_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(PolledQuote { price: body.price, updated_at })
    }
}
