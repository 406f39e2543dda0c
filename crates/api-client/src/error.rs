use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("The API responded with HTTP status {status}.")]
    Status { status: u16 },

    #[error("The provider rejected the request (code {code}): {info}")]
    Provider { code: i64, info: String },

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),
}

impl ApiError {
    /// Transport failures, server errors and rate limiting may clear up on
    /// their own; everything else will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(e) => !e.is_builder() && !e.is_decode(),
            ApiError::Status { status } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
