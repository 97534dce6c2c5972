//! Recording diagnostic sink.

use panelsync_core::DiagnosticSink;
use panelsync_daemon::{DaemonCode, DaemonError};
use parking_lot::Mutex;

/// One recorded daemon failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Operation that made the call.
    pub operation: &'static str,
    /// Failure code.
    pub code: DaemonCode,
    /// Rendered error.
    pub message: String,
}

/// Keeps every reported failure in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded entries.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Returns the number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Checks if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl DiagnosticSink for RecordingSink {
    fn warn(&self, operation: &'static str, error: &DaemonError) {
        self.entries.lock().push(Diagnostic {
            operation,
            code: error.code(),
            message: error.to_string(),
        });
    }
}
