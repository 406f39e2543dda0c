use crate::error::ApiError;
use crate::FxClient;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// An offline client with fixed rates, for tests and dry runs.
///
/// Unknown currencies are quoted at 1.
#[derive(Debug, Clone, Default)]
pub struct MockFxClient;

impl MockFxClient {
    pub fn rate_for(currency: &str) -> Decimal {
        match currency {
            "ILS" => Decimal::new(321, 2),
            "EUR" => Decimal::new(86, 2),
            "GBP" => Decimal::new(73, 2),
            _ => Decimal::ONE,
        }
    }
}

#[async_trait]
impl FxClient for MockFxClient {
    async fn fetch_historical(
        &self,
        _date: NaiveDate,
        currencies: &[String],
    ) -> Result<BTreeMap<String, Decimal>, ApiError> {
        Ok(currencies
            .iter()
            .map(|c| (c.clone(), Self::rate_for(c)))
            .collect())
    }
}
