use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Maximum {0} concurrent export tasks per owner allowed")]
    ConcurrencyLimitExceeded(usize),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {0} does not belong to the requesting owner")]
    Forbidden(String),

    #[error("Invalid task state: {0}")]
    InvalidState(String),

    #[error("Export exceeds maximum file size of {0} bytes")]
    SizeLimitExceeded(u64),

    #[error("Export timed out after {0} seconds")]
    TimeoutExceeded(u64),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Invalid export request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
