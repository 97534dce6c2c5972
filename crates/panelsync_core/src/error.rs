//! Error types for panel services.

use panelsync_daemon::{DaemonCode, DaemonError, PermissionError};
use panelsync_store::{ServerId, StoreError, Table, UserId};
use thiserror::Error;

/// Result type for panel services.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by panel services.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Table of the missing entity.
        entity: Table,
        /// Row id.
        id: u64,
    },

    /// The grantee already owns the server.
    #[error("user {user_id} owns server {server_id} and cannot also be its subuser")]
    OwnershipConflict {
        /// Grantee.
        user_id: UserId,
        /// Server.
        server_id: ServerId,
    },

    /// The grantee already has access to the server.
    #[error("user {user_id} is already a subuser of server {server_id}")]
    DuplicateGrant {
        /// Grantee.
        user_id: UserId,
        /// Server.
        server_id: ServerId,
    },

    /// Another operation is changing the same row; nothing was sent to the daemon.
    #[error("{entity} {id} is being modified concurrently")]
    Conflict {
        /// Table of the contested row.
        entity: Table,
        /// Row id.
        id: u64,
    },

    /// Malformed input or a violated store constraint.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The daemon call failed; the local change was rolled back.
    #[error("daemon unreachable (code {code}): {source}")]
    DaemonUnreachable {
        /// `E_CONN_REFUSED` or the daemon's status code.
        code: DaemonCode,
        /// Underlying failure.
        source: DaemonError,
    },

    /// Any other store failure.
    #[error("unexpected error: {0}")]
    Unexpected(#[source] StoreError),
}

impl ServiceError {
    /// Creates a not-found error.
    pub fn not_found(entity: Table, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wraps a failed daemon call.
    pub fn daemon_unreachable(source: DaemonError) -> Self {
        Self::DaemonUnreachable {
            code: source.code(),
            source,
        }
    }

    /// Returns the daemon code for [`ServiceError::DaemonUnreachable`].
    #[must_use]
    pub fn daemon_code(&self) -> Option<DaemonCode> {
        match self {
            ServiceError::DaemonUnreachable { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns a short machine-readable kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::OwnershipConflict { .. } => "ownership_conflict",
            ServiceError::DuplicateGrant { .. } => "duplicate_grant",
            ServiceError::Conflict { .. } => "conflict",
            ServiceError::Validation(_) => "validation",
            ServiceError::DaemonUnreachable { .. } => "daemon_unreachable",
            ServiceError::Unexpected(_) => "unexpected",
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RecordNotFound { table, id } => Self::NotFound { entity: table, id },
            StoreError::TransactionConflict { table, id, .. } => Self::Conflict { entity: table, id },
            StoreError::Validation { .. } | StoreError::UniqueViolation { .. } => {
                Self::Validation(err.to_string())
            }
            other => Self::Unexpected(other),
        }
    }
}

impl From<PermissionError> for ServiceError {
    fn from(err: PermissionError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelsync_daemon::ConnectionKind;
    use panelsync_store::TransactionId;

    #[test]
    fn store_errors_map_to_taxonomy() {
        let err: ServiceError = StoreError::not_found(Table::Servers, 7).into();
        assert!(matches!(
            err,
            ServiceError::NotFound {
                entity: Table::Servers,
                id: 7
            }
        ));

        let err: ServiceError = StoreError::validation(Table::Users, "bad email").into();
        assert_eq!(err.kind(), "validation");

        let err: ServiceError =
            StoreError::conflict(Table::Subusers, 3, TransactionId::new(9)).into();
        assert!(matches!(
            err,
            ServiceError::Conflict {
                entity: Table::Subusers,
                id: 3
            }
        ));
        assert_eq!(err.kind(), "conflict");

        let err: ServiceError = StoreError::DatabaseLocked.into();
        assert_eq!(err.kind(), "unexpected");
    }

    #[test]
    fn daemon_code_is_carried() {
        let err = ServiceError::daemon_unreachable(DaemonError::rejected(400, "bad"));
        assert_eq!(err.daemon_code(), Some(DaemonCode::Status(400)));
        assert!(err.to_string().contains("400"));

        let err = ServiceError::daemon_unreachable(DaemonError::connection(
            ConnectionKind::ConnectionRefused,
            "refused",
        ));
        assert!(err.to_string().contains("E_CONN_REFUSED"));
    }

    #[test]
    fn permission_errors_are_validation() {
        let err: ServiceError = PermissionError::Empty.into();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
