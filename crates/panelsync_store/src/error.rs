//! Error types for the record store.

use crate::types::{Table, TransactionId};
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row not found.
    #[error("record {id} not found in {table}")]
    RecordNotFound {
        /// The table searched.
        table: Table,
        /// The row id that was not found.
        id: u64,
    },

    /// A unique index already holds the key, either committed or reserved
    /// by another open transaction.
    #[error("unique constraint {constraint} violated by value {value:?}")]
    UniqueViolation {
        /// Table the constraint belongs to.
        table: Table,
        /// Constraint name, e.g. `users.email`.
        constraint: String,
        /// The conflicting key value.
        value: String,
    },

    /// Another open transaction is already updating or deleting the row.
    #[error("row {id} in {table} is being written by transaction {holder}")]
    TransactionConflict {
        /// Table of the contested row.
        table: Table,
        /// Row id.
        id: u64,
        /// Transaction holding the row.
        holder: TransactionId,
    },

    /// A row failed validation before being written.
    #[error("invalid {table} row: {message}")]
    Validation {
        /// Table of the rejected row.
        table: Table,
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// Row payload could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// Snapshot file has an unexpected format.
    #[error("invalid snapshot format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Another process holds the snapshot lock.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Creates a record not found error.
    pub fn not_found(table: Table, id: u64) -> Self {
        Self::RecordNotFound { table, id }
    }

    /// Creates a transaction conflict error.
    pub fn conflict(table: Table, id: u64, holder: TransactionId) -> Self {
        Self::TransactionConflict { table, id, holder }
    }

    /// Creates a validation error.
    pub fn validation(table: Table, message: impl Into<String>) -> Self {
        Self::Validation {
            table,
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns the violated constraint name, if this is a unique violation.
    #[must_use]
    pub fn violated_constraint(&self) -> Option<&str> {
        match self {
            Self::UniqueViolation { constraint, .. } => Some(constraint.as_str()),
            _ => None,
        }
    }
}
