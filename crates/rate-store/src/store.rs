use crate::error::RateStoreError;
use crate::schema::FX_UPSERT;
use api_client::FxClient;
use chrono::NaiveDate;
use core_types::{FxRate, MONEY_SCALE, Value};
use database::{DatabaseService, FutureExt};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use tracing::{debug, info};

fn normalize_currency(code: &str) -> Result<String, RateStoreError> {
    let code = code.trim();
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(RateStoreError::InvalidCurrency(code.to_string()))
    }
}

/// Writes the rates for `date` in one upsert inside one transaction scope.
///
/// Codes are validated before anything is opened, so an invalid code writes
/// nothing. An empty map returns 0 without touching the database.
pub async fn store_rates(
    service: &DatabaseService,
    date: NaiveDate,
    rates: &BTreeMap<String, Decimal>,
) -> Result<usize, RateStoreError> {
    let rows = rates
        .iter()
        .map(|(currency, rate)| {
            let rate = rate.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
            Ok(FxRate::new(date, normalize_currency(currency)?, rate).to_values())
        })
        .collect::<Result<Vec<_>, RateStoreError>>()?;

    if rows.is_empty() {
        debug!(%date, "No rates to store.");
        return Ok(0);
    }

    let count = rows.len();
    service
        .run_in_transaction(move |tx| async move { tx.upsert(&FX_UPSERT, &rows).await }.boxed())
        .await?;

    info!(%date, rows = count, "Stored FX rates.");
    Ok(count)
}

/// Reads back every stored rate for `date`, ordered by currency.
pub async fn load_rates(
    service: &DatabaseService,
    date: NaiveDate,
) -> Result<Vec<FxRate>, RateStoreError> {
    let rows = service
        .run_in_transaction(move |tx| {
            async move {
                let sql = format!(
                    "SELECT date, currency, rate_to_base, fetched_at FROM fx_rates \
                     WHERE date = {} ORDER BY currency",
                    tx.placeholder(1)
                );
                tx.execute(&sql, &[Value::Date(date)]).await
            }
            .boxed()
        })
        .await?;

    rows.iter()
        .map(|row| FxRate::try_from(row).map_err(RateStoreError::from))
        .collect()
}

/// Fetches the rates for `date` and stores them.
///
/// The fetch completes (including the client's own retries) before any scope
/// is opened, so a failed fetch leaves the table untouched.
pub async fn sync_rates(
    client: &dyn FxClient,
    service: &DatabaseService,
    date: NaiveDate,
    currencies: &[String],
) -> Result<BTreeMap<String, Decimal>, RateStoreError> {
    let currencies = currencies
        .iter()
        .map(|c| normalize_currency(c))
        .collect::<Result<Vec<_>, _>>()?;

    let rates = client.fetch_historical(date, &currencies).await?;
    store_rates(service, date, &rates).await?;
    Ok(rates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_codes_are_normalized() {
        assert_eq!(normalize_currency(" eur ").unwrap(), "EUR");
        assert!(matches!(
            normalize_currency("EURO"),
            Err(RateStoreError::InvalidCurrency(_))
        ));
        assert!(normalize_currency("E1R").is_err());
        assert!(normalize_currency("").is_err());
    }
}
