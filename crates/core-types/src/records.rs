use crate::error::CoreError;
use crate::value::{Row, Value};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of fractional digits kept for amounts and rates at rest.
pub const MONEY_SCALE: u32 = 6;

/// One billing line, keyed by `(date, bill_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub date: NaiveDate,
    pub bill_id: i64,
    pub currency: String,
    pub name: String,
    pub amount1: Decimal,
    pub amount2: Decimal,
}

impl UsageRecord {
    /// Values in the column order of `usage_data`.
    pub fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Date(self.date),
            Value::Int(self.bill_id),
            Value::Text(self.currency.clone()),
            Value::Text(self.name.clone()),
            Value::Decimal(self.amount1),
            Value::Decimal(self.amount2),
        ]
    }
}

impl TryFrom<&Row> for UsageRecord {
    type Error = CoreError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            date: row.get_date("date")?,
            bill_id: row.get_i64("bill_id")?,
            currency: row.get_string("currency")?,
            name: row.get_string("name")?,
            amount1: row.get_decimal("amount1")?,
            amount2: row.get_decimal("amount2")?,
        })
    }
}

/// A historical exchange rate against the base currency, keyed by `(date, currency)`.
///
/// `fetched_at` is assigned by the storage layer on every write and is `None`
/// only for rates that have not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxRate {
    pub date: NaiveDate,
    pub currency: String,
    pub rate_to_base: Decimal,
    pub fetched_at: Option<NaiveDateTime>,
}

impl FxRate {
    pub fn new(date: NaiveDate, currency: impl Into<String>, rate_to_base: Decimal) -> Self {
        Self {
            date,
            currency: currency.into(),
            rate_to_base,
            fetched_at: None,
        }
    }

    /// Values for the writable columns of `fx_rates`; `fetched_at` is left to the database.
    pub fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Date(self.date),
            Value::Text(self.currency.clone()),
            Value::Decimal(self.rate_to_base),
        ]
    }
}

impl TryFrom<&Row> for FxRate {
    type Error = CoreError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            date: row.get_date("date")?,
            currency: row.get_string("currency")?,
            rate_to_base: row.get_decimal("rate_to_base")?,
            fetched_at: row.get_optional_timestamp("fetched_at")?,
        })
    }
}
