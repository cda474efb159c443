use shared_database::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient {0} not found")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}
