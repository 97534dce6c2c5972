//! Diagnostics for failed daemon calls.

use panelsync_daemon::DaemonError;

/// Receives daemon failures for operational visibility.
///
/// Called once per failed daemon call, after the local rollback. Must not
/// block or fail.
pub trait DiagnosticSink: Send + Sync {
    /// Records a failed call made by `operation`.
    fn warn(&self, operation: &'static str, error: &DaemonError);
}

/// Emits a `tracing` warning per failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warn(&self, operation: &'static str, error: &DaemonError) {
        tracing::warn!(
            operation,
            code = %error.code(),
            error = %error,
            "daemon call failed, local change rolled back"
        );
    }
}
