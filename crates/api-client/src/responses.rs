use crate::error::ApiError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// The body of `GET /historical`.
///
/// On success `quotes` maps `{SOURCE}{CURRENCY}` (e.g. `"USDEUR"`) to the rate;
/// on failure `success` is false and `error` says why.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalResponse {
    pub success: bool,
    #[serde(default)]
    pub source: Option<String>,
    // Converted to Decimal through the number's shortest text form.
    #[serde(default)]
    pub quotes: BTreeMap<String, serde_json::Number>,
    #[serde(default)]
    pub error: Option<ProviderError>,
}

/// Represents an error response from the CurrencyLayer API.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderError {
    pub code: i64,
    #[serde(default)]
    pub info: String,
}

impl HistoricalResponse {
    /// Picks the requested currencies out of the quote table.
    ///
    /// Every requested currency must be quoted; a partial answer is rejected.
    pub fn into_rates(
        self,
        source: &str,
        currencies: &[String],
    ) -> Result<BTreeMap<String, Decimal>, ApiError> {
        if !self.success {
            let error = self.error.unwrap_or(ProviderError {
                code: 0,
                info: "unsuccessful response without error details".to_string(),
            });
            return Err(ApiError::Provider {
                code: error.code,
                info: error.info,
            });
        }

        currencies
            .iter()
            .map(|currency| {
                let key = format!("{source}{currency}");
                let number = self
                    .quotes
                    .get(&key)
                    .ok_or_else(|| ApiError::InvalidData(format!("no quote for {key}")))?;
                Ok((currency.clone(), parse_rate(&key, number)?))
            })
            .collect()
    }
}

fn parse_rate(key: &str, number: &serde_json::Number) -> Result<Decimal, ApiError> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| ApiError::Deserialization(format!("quote {key} = {text}: {e}")))
}
