use thiserror::Error;

use crate::hazard::HazardId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HazardError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Hazard {0} not found")]
    NotFound(HazardId),

    #[error("Hazard {0} is already deleted")]
    AlreadyDeleted(HazardId),
}

impl HazardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        HazardError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, HazardError>;
