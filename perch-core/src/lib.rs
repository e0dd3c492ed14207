pub mod clock;
pub mod repository;
pub mod token;

/// Infrastructure failure inside a storage collaborator. These are
/// logged with context and surfaced opaquely; domain conditions are
/// never reported through this type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
    #[error("row decode failed: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
