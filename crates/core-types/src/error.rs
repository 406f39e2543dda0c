use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Column '{0}' is missing from the row")]
    MissingColumn(String),

    #[error("Column '{column}' holds {found}, expected {expected}")]
    InvalidValue {
        column: String,
        expected: &'static str,
        found: String,
    },
}
