use crate::error::ApiError;
use crate::retry::{RetryPolicy, with_backoff};
use async_trait::async_trait;
use chrono::NaiveDate;
use configuration::FxSettings;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub mod error;
mod mock;
pub mod responses;
pub mod retry;
// --- Public API ---
pub use mock::MockFxClient;
pub use responses::{HistoricalResponse, ProviderError};

/// The abstract interface for a historical exchange-rate provider.
///
/// Implementations are read-only: they may retry internally, but they never
/// touch storage, so a failed fetch leaves nothing behind.
#[async_trait]
pub trait FxClient: Send + Sync {
    /// Returns the rate of each requested currency against the provider's base
    /// currency on `date`, keyed by currency code.
    async fn fetch_historical(
        &self,
        date: NaiveDate,
        currencies: &[String],
    ) -> Result<BTreeMap<String, Decimal>, ApiError>;
}

/// A concrete implementation of `FxClient` for the CurrencyLayer API.
#[derive(Clone)]
pub struct CurrencyLayerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    source: String,
    retry: RetryPolicy,
}

impl CurrencyLayerClient {
    pub fn new(settings: &FxSettings, api_key: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            source: settings.source.to_ascii_uppercase(),
            retry: RetryPolicy {
                max_attempts: settings.max_attempts,
                base_delay: settings.base_delay(),
            },
        })
    }

    async fn fetch_once(
        &self,
        date: &str,
        currencies: &[String],
    ) -> Result<BTreeMap<String, Decimal>, ApiError> {
        let url = format!("{}/historical", self.base_url);
        let joined = currencies.join(",");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("access_key", self.api_key.as_str()),
                ("date", date),
                ("currencies", joined.as_str()),
                ("source", self.source.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let body: HistoricalResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialization(e.to_string()))?;
        body.into_rates(&self.source, currencies)
    }
}

#[async_trait]
impl FxClient for CurrencyLayerClient {
    async fn fetch_historical(
        &self,
        date: NaiveDate,
        currencies: &[String],
    ) -> Result<BTreeMap<String, Decimal>, ApiError> {
        let currencies: Vec<String> = currencies.iter().map(|c| c.to_ascii_uppercase()).collect();
        if currencies.is_empty() {
            return Ok(BTreeMap::new());
        }
        let date = date.format("%Y-%m-%d").to_string();
        debug!(%date, currencies = %currencies.join(","), "Requesting historical rates");

        let rates = with_backoff(&self.retry, || self.fetch_once(&date, &currencies)).await?;
        info!(%date, count = rates.len(), "Fetched historical rates.");
        Ok(rates)
    }
}
