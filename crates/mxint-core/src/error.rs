use thiserror::Error;

/// Core error types for mxint
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),

    #[error("Accumulator overflow: {0}")]
    AccumulatorOverflow(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backend error: {0}")]
    BackendError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
