//! Row parsing for the billing export.
//!
//! Columns, in order: `Date_, Bill_ID, Currency, Name, Product1 revenue,
//! Product2 revenue`. Extra trailing columns are ignored.

use crate::error::RowParseError;
use chrono::NaiveDate;
use core_types::{MONEY_SCALE, UsageRecord};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Number of columns a row must carry.
pub const FIELD_COUNT: usize = 6;

// NUMERIC(15,6) leaves nine integer digits.
const MAX_INTEGER_DIGITS: u32 = 9;

/// Parses a strict `DD/MM/YYYY` date. Day and month may have one or two
/// digits; the year must have four.
pub fn parse_date(input: &str) -> Result<NaiveDate, RowParseError> {
    let invalid = || RowParseError::InvalidDate(input.to_string());
    let digits = |part: &str, min: usize, max: usize| -> Option<u32> {
        let ok = (min..=max).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit());
        if ok { part.parse().ok() } else { None }
    };

    let mut parts = input.trim().split('/');
    let (Some(day), Some(month), Some(year), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let day = digits(day, 1, 2).ok_or_else(invalid)?;
    let month = digits(month, 1, 2).ok_or_else(invalid)?;
    let year = digits(year, 4, 4).ok_or_else(invalid)?;
    let year = i32::try_from(year).map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Parses a monetary amount exactly and rounds it half away from zero to the
/// storage scale.
pub fn parse_amount(column: &'static str, input: &str) -> Result<Decimal, RowParseError> {
    let invalid = || RowParseError::InvalidAmount {
        column,
        value: input.to_string(),
    };
    let text = input.trim();
    let amount = Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| invalid())?
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);

    if amount.abs() >= Decimal::from(10u64.pow(MAX_INTEGER_DIGITS)) {
        return Err(invalid());
    }
    Ok(amount)
}

pub fn parse_row(fields: &[String]) -> Result<UsageRecord, RowParseError> {
    if fields.len() < FIELD_COUNT {
        return Err(RowParseError::TooFewFields {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    let date = parse_date(&fields[0])?;

    let bill_id = fields[1]
        .trim()
        .parse::<i64>()
        .map_err(|_| RowParseError::InvalidBillId(fields[1].clone()))?;

    let currency = fields[2].trim();
    if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(RowParseError::InvalidCurrency(fields[2].clone()));
    }

    let name = fields[3].trim();
    if name.is_empty() {
        return Err(RowParseError::EmptyName);
    }

    Ok(UsageRecord {
        date,
        bill_id,
        currency: currency.to_ascii_uppercase(),
        name: name.to_string(),
        amount1: parse_amount("Product1 revenue", &fields[4])?,
        amount2: parse_amount("Product2 revenue", &fields[5])?,
    })
}
