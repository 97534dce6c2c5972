//! Error types for daemon calls.

use std::fmt;
use thiserror::Error;

/// Result type for daemon calls.
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Why a request never produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// The daemon refused the connection or could not be resolved.
    ConnectionRefused,
    /// The request timed out.
    Timeout,
    /// Any other transport failure.
    Network,
}

impl ConnectionKind {
    /// Returns a short machine-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ConnectionKind::ConnectionRefused => "connection_refused",
            ConnectionKind::Timeout => "timeout",
            ConnectionKind::Network => "network",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while talking to a daemon.
#[derive(Error, Debug)]
pub enum DaemonError {
    /// No response was received.
    #[error("daemon unreachable ({kind}): {message}")]
    Connection {
        /// Failure classification.
        kind: ConnectionKind,
        /// Transport message.
        message: String,
    },

    /// The daemon answered with a non-success status.
    #[error("daemon rejected request with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        message: String,
    },

    /// A request body could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl DaemonError {
    /// Creates a connection error.
    pub fn connection(kind: ConnectionKind, message: impl Into<String>) -> Self {
        Self::Connection {
            kind,
            message: message.into(),
        }
    }

    /// Creates a rejection error.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Returns the status code, if the daemon answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            DaemonError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the machine-readable code reported to callers.
    #[must_use]
    pub fn code(&self) -> DaemonCode {
        match self.status() {
            Some(status) => DaemonCode::Status(status),
            None => DaemonCode::ConnectionRefused,
        }
    }
}

/// Machine-readable failure code.
///
/// Renders as `E_CONN_REFUSED` when no response was received and as the
/// numeric status otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaemonCode {
    /// No response.
    ConnectionRefused,
    /// Non-success HTTP status.
    Status(u16),
}

impl DaemonCode {
    /// Sentinel rendered for [`DaemonCode::ConnectionRefused`].
    pub const CONN_REFUSED: &'static str = "E_CONN_REFUSED";
}

impl fmt::Display for DaemonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonCode::ConnectionRefused => f.write_str(Self::CONN_REFUSED),
            DaemonCode::Status(status) => write!(f, "{status}"),
        }
    }
}

impl serde::Serialize for DaemonCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DaemonCode::ConnectionRefused => serializer.serialize_str(Self::CONN_REFUSED),
            DaemonCode::Status(status) => serializer.serialize_u16(*status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        let err = DaemonError::connection(ConnectionKind::Timeout, "deadline elapsed");
        assert_eq!(err.code(), DaemonCode::ConnectionRefused);
        assert_eq!(err.code().to_string(), "E_CONN_REFUSED");

        let err = DaemonError::rejected(400, "bad request");
        assert_eq!(err.code(), DaemonCode::Status(400));
        assert_eq!(err.code().to_string(), "400");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn protocol_errors_have_no_status() {
        let err = DaemonError::Protocol("bad body".into());
        assert_eq!(err.status(), None);
        assert_eq!(err.code(), DaemonCode::ConnectionRefused);
    }

    #[test]
    fn error_display() {
        let err = DaemonError::connection(ConnectionKind::ConnectionRefused, "tcp connect");
        assert!(err.to_string().contains("connection_refused"));

        let err = DaemonError::rejected(503, "maintenance");
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn code_serializes_like_display() {
        assert_eq!(
            serde_json::to_string(&DaemonCode::ConnectionRefused).unwrap(),
            "\"E_CONN_REFUSED\""
        );
        assert_eq!(serde_json::to_string(&DaemonCode::Status(400)).unwrap(), "400");
    }
}
