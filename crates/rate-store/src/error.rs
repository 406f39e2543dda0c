use api_client::error::ApiError;
use core_types::CoreError;
use database::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateStoreError {
    #[error("'{0}' is not a three-letter currency code")]
    InvalidCurrency(String),

    #[error("Failed to fetch rates: {0}")]
    Fetch(#[from] ApiError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Stored rate could not be decoded: {0}")]
    Decode(#[from] CoreError),
}
