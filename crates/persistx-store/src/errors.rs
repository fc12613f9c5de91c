//! Error handling for persistx-store
//!
//! Wraps persistx-core ExError with store-specific helpers

use persistx_core::errors::{ExError, ExErrorKind};
use std::path::Path;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a mapping application error
pub fn mapping_error(mapping_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("apply_mapping")
        .with_message(format!("Mapping {} failed: {}", mapping_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(mapping_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::ConstraintViolation)
        .with_op("mapping_checksum")
        .with_message(format!(
            "Checksum mismatch for mapping {}: expected {}, got {}",
            mapping_id, expected, actual
        ))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error for a file the store tried to read
pub fn io_error(operation: &str, path: &Path, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(format!("{}: {}", path.display(), err))
}

/// Create an invalid entity/column name error
pub fn invalid_identifier(op: &str, name: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op(op.to_string())
        .with_message(format!("'{}' is not a valid SQL identifier", name))
}

/// Create a cache strategy violation for a write to a read-only region
pub fn read_only_violation(entity: &str, id: i64) -> ExError {
    ExError::new(ExErrorKind::CacheStrategyViolation)
        .with_op("session.save")
        .with_entity(entity)
        .with_entity_id(id)
        .with_message("entities in a read-only cache region cannot be updated")
}

/// Create a transaction state error
pub fn transaction_state(op: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::TransactionState)
        .with_op(op.to_string())
        .with_message(reason.to_string())
}
