use crate::error::CoreError;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical text form used for calendar dates at rest.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Text form SQLite uses for `CURRENT_TIMESTAMP`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single typed SQL value, either bound as a statement parameter or read
/// back from a result row.
///
/// Backends do not all store every variant natively (SQLite keeps decimals and
/// dates as TEXT), so the `as_*` accessors accept every representation a value
/// can come back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Decimal(Decimal),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A short name for the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Decimal(_) => "decimal",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Int(v) => Some(Decimal::from(*v)),
            Value::Text(s) => Decimal::from_str(s.trim()).ok(),
            Value::Float(f) => Decimal::try_from(*f).ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok(),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => {
                let s = s.trim();
                NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                    .ok()
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A result row: an ordered mapping from column name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push(column.into());
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Looks up a value by column name. Column names compare case-insensitively
    /// because Postgres folds unquoted identifiers to lower case.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|i| &self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    fn require(&self, column: &str) -> Result<&Value, CoreError> {
        self.get(column)
            .ok_or_else(|| CoreError::MissingColumn(column.to_string()))
    }

    fn invalid(column: &str, expected: &'static str, found: &Value) -> CoreError {
        CoreError::InvalidValue {
            column: column.to_string(),
            expected,
            found: found.kind().to_string(),
        }
    }

    pub fn get_i64(&self, column: &str) -> Result<i64, CoreError> {
        let value = self.require(column)?;
        value
            .as_i64()
            .ok_or_else(|| Self::invalid(column, "integer", value))
    }

    pub fn get_string(&self, column: &str) -> Result<String, CoreError> {
        let value = self.require(column)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Self::invalid(column, "text", value))
    }

    pub fn get_decimal(&self, column: &str) -> Result<Decimal, CoreError> {
        let value = self.require(column)?;
        value
            .as_decimal()
            .ok_or_else(|| Self::invalid(column, "decimal", value))
    }

    pub fn get_date(&self, column: &str) -> Result<NaiveDate, CoreError> {
        let value = self.require(column)?;
        value
            .as_date()
            .ok_or_else(|| Self::invalid(column, "date", value))
    }

    /// Like the other getters, but `NULL` maps to `None`.
    pub fn get_optional_timestamp(&self, column: &str) -> Result<Option<NaiveDateTime>, CoreError> {
        let value = self.require(column)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_timestamp()
            .map(Some)
            .ok_or_else(|| Self::invalid(column, "timestamp", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn text_decimals_read_back_exactly() {
        let value = Value::Text("4041.904278".into());
        assert_eq!(value.as_decimal(), Some(dec!(4041.904278)));
    }

    #[test]
    fn row_lookup_ignores_case() {
        let mut row = Row::with_capacity(2);
        row.push("CNT", Value::Int(3));
        row.push("currency", Value::from("EUR"));

        assert_eq!(row.get_i64("cnt").unwrap(), 3);
        assert_eq!(row.get_string("CURRENCY").unwrap(), "EUR");
        assert_eq!(
            row.get_i64("missing"),
            Err(CoreError::MissingColumn("missing".into()))
        );
    }

    #[test]
    fn sqlite_timestamps_parse() {
        let value = Value::Text("2021-10-01 08:30:00".into());
        let ts = value.as_timestamp().unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2021, 10, 1).unwrap());
    }

    #[test]
    fn wrong_kind_is_reported() {
        let mut row = Row::default();
        row.push("amount1", Value::Bool(true));
        let err = row.get_decimal("amount1").unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { expected: "decimal", .. }));
    }
}
