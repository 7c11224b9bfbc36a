//! Error types for jobq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("execution failed: {0}")]
    ExecutionFailure(String),
}

pub type Result<T> = std::result::Result<T, Error>;
