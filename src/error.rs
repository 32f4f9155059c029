use thiserror::Error;

use crate::store::StoreError;

/// Rejections of malformed requests. The messages are returned to clients verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("JSON must have \"links\" key")]
    MissingLinksField,
    #[error("All links must be strings")]
    NonStringLink,
    #[error("Not valid time interval")]
    InvalidTimeInterval,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}
