//! Shared service context.

use crate::config::PanelConfig;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::random::{ThreadRngTokens, TokenGenerator};
use panelsync_daemon::{DaemonClient, HttpClient};
use panelsync_store::Store;
use std::sync::Arc;

/// Collaborators injected into every service.
///
/// Holds no mutable state of its own; services can share one context
/// behind an `Arc` across threads.
pub struct ServiceContext<S, C> {
    store: Arc<S>,
    daemon: DaemonClient<C>,
    tokens: Arc<dyn TokenGenerator>,
    diagnostics: Arc<dyn DiagnosticSink>,
    config: PanelConfig,
}

impl<S: Store, C: HttpClient> ServiceContext<S, C> {
    /// Creates a context with random tokens and `tracing` diagnostics.
    pub fn new(store: Arc<S>, http: C, config: PanelConfig) -> Self {
        Self {
            store,
            daemon: DaemonClient::new(http),
            tokens: Arc::new(ThreadRngTokens),
            diagnostics: Arc::new(TracingSink),
            config,
        }
    }

    /// Replaces the token generator.
    #[must_use]
    pub fn with_tokens(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Replaces the diagnostic sink.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Returns the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the daemon client.
    pub fn daemon(&self) -> &DaemonClient<C> {
        &self.daemon
    }

    /// Returns the token generator.
    pub fn tokens(&self) -> &dyn TokenGenerator {
        self.tokens.as_ref()
    }

    /// Returns the diagnostic sink.
    pub fn diagnostics(&self) -> &dyn DiagnosticSink {
        self.diagnostics.as_ref()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Generates a daemon secret of the configured length.
    pub fn generate_secret(&self) -> String {
        self.tokens.token(self.config.daemon_secret_length)
    }
}
