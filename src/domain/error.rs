//! Domain errors

use thiserror::Error;

/// Domain-level error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Normalized value is empty or violates the tag character set
    #[error("Validation: {0}")]
    Validation(String),

    #[error("Charge point not found: {0}")]
    ChargePointNotFound(String),

    #[error("Charge point already exists: {0}")]
    ChargePointAlreadyExists(String),

    /// Pushing a new tag towards the charge point failed
    #[error("Propagation to charge point {charge_point_id} failed: {reason}")]
    Propagation {
        charge_point_id: String,
        reason: String,
    },

    #[error("Timed out waiting for charge point {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
