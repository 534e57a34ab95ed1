use crate::store::StoreError;

/// Errors raised by the ingestion and query paths.
///
/// The HTTP layer maps them to 400 / 404 / 500.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("invalid message: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("snapshot store failure: {0}")]
    Storage(#[from] StoreError),
}

impl FleetError {
    pub fn validation(msg: impl Into<String>) -> Self {
        FleetError::Validation(msg.into())
    }
}
