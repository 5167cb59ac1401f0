//! Error types for bulkcopy operations

use crate::schema::StoreType;
use thiserror::Error;

/// Failures reported by the data store: the shape query or a bulk write.
///
/// Store implementations map their client errors onto these variants. The
/// inserter never retries, rewrites or swallows them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error("Permission denied on {table}: {reason}")]
    PermissionDenied { table: String, reason: String },

    #[error("Connection failure: {reason}")]
    Connectivity { reason: String },

    #[error("Constraint violation on {table}.{column}: {reason}")]
    ConstraintViolation {
        table: String,
        column: String,
        reason: String,
    },

    #[error("Type mismatch on {table}.{column}: expected {expected:?}, got {got}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: StoreType,
        got: String,
    },

    #[error("Operation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Transaction {transaction_id} is no longer active")]
    TransactionClosed { transaction_id: u64 },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store error: {reason}")]
    Other { reason: String },
}

/// Precondition violations, reported before any I/O.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("Invalid argument {parameter}: must not be empty")]
    Empty { parameter: String },

    #[error("Invalid argument {parameter}: {value:?} - {reason}")]
    Malformed {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Invalid argument {parameter}: {value} - {reason}")]
    OutOfRange {
        parameter: String,
        value: String,
        reason: String,
    },
}

impl ArgumentError {
    /// Name of the offending parameter.
    pub fn parameter(&self) -> &str {
        match self {
            ArgumentError::Empty { parameter }
            | ArgumentError::Malformed { parameter, .. }
            | ArgumentError::OutOfRange { parameter, .. } => parameter,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all bulkcopy errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BulkCopyError {
    #[error("Argument error: {0}")]
    Argument(#[from] ArgumentError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl BulkCopyError {
    /// The store error carried by this error, if it came from the store.
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            BulkCopyError::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for bulkcopy operations.
pub type BulkCopyResult<T> = Result<T, BulkCopyError>;

// =============================================================================
// TESTS
// =============================================================================
