//! Local-write-then-remote-sync with compensation.
//!
//! ```text
//! Pending ──local write──▶ LocalWritten ──daemon ok──▶ Synced
//!    │                          │
//!    └──local error──┐          └──daemon error──▶ RolledBack
//!                    ▼
//!               RolledBack
//! ```
//!
//! The daemon is called only after the local write, and commit is the last
//! step. A committed change therefore always reached the daemon, and a
//! rolled-back change was never accepted by it.

use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};
use panelsync_daemon::{DaemonClient, DaemonResult, HttpClient};
use panelsync_store::{Store, Transaction};

/// Progress of one synchronized operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Transaction open, nothing written.
    Pending,
    /// Local writes staged, daemon not yet confirmed.
    LocalWritten,
    /// Daemon accepted the change and the transaction committed.
    Synced,
    /// The transaction was rolled back.
    RolledBack,
}

impl SyncState {
    /// Returns true for `Synced` and `RolledBack`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Synced | SyncState::RolledBack)
    }

    /// Checks whether `next` may follow this state.
    pub fn can_transition_to(&self, next: SyncState) -> bool {
        matches!(
            (self, next),
            (SyncState::Pending, SyncState::LocalWritten)
                | (SyncState::Pending, SyncState::RolledBack)
                | (SyncState::LocalWritten, SyncState::Synced)
                | (SyncState::LocalWritten, SyncState::RolledBack)
        )
    }
}

/// Tracks the state of one run for logging.
struct Progress {
    operation: &'static str,
    state: SyncState,
}

impl Progress {
    fn enter(&mut self, next: SyncState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal sync transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(operation = self.operation, from = ?self.state, to = ?next, "sync state");
        self.state = next;
    }
}

/// Runs a local write and its daemon call as one compensated unit.
pub struct SyncCoordinator<'a, S, C> {
    ctx: &'a ServiceContext<S, C>,
}

impl<'a, S: Store, C: HttpClient> SyncCoordinator<'a, S, C> {
    /// Creates a coordinator over a context.
    pub fn new(ctx: &'a ServiceContext<S, C>) -> Self {
        Self { ctx }
    }

    /// Runs `local` inside a fresh transaction, then `remote` with its result.
    ///
    /// Commits only if both succeed. Any failure rolls the transaction back
    /// before returning. A daemon failure is reported to the diagnostic sink
    /// and surfaced as [`ServiceError::DaemonUnreachable`].
    pub fn run<T, L, R>(&self, operation: &'static str, local: L, remote: R) -> ServiceResult<T>
    where
        L: FnOnce(&S, &mut Transaction) -> ServiceResult<T>,
        R: FnOnce(&DaemonClient<C>, &T) -> DaemonResult<()>,
    {
        let store = self.ctx.store();
        let mut progress = Progress {
            operation,
            state: SyncState::Pending,
        };
        let mut txn = store.begin()?;

        let value = match local(store, &mut txn) {
            Ok(value) => value,
            Err(err) => {
                self.abort(&mut txn, &mut progress);
                return Err(err);
            }
        };
        progress.enter(SyncState::LocalWritten);

        if let Err(err) = remote(self.ctx.daemon(), &value) {
            self.abort(&mut txn, &mut progress);
            self.ctx.diagnostics().warn(operation, &err);
            return Err(ServiceError::daemon_unreachable(err));
        }

        if let Err(err) = store.commit(&mut txn) {
            tracing::error!(
                operation,
                error = %err,
                "commit failed after the daemon accepted the change"
            );
            if txn.is_active() {
                self.abort(&mut txn, &mut progress);
            }
            return Err(err.into());
        }
        progress.enter(SyncState::Synced);
        tracing::info!(operation, txn = %txn.id(), "change synced");
        Ok(value)
    }

    fn abort(&self, txn: &mut Transaction, progress: &mut Progress) {
        if let Err(err) = self.ctx.store().rollback(txn) {
            tracing::error!(operation = progress.operation, error = %err, "rollback failed");
        }
        progress.enter(SyncState::RolledBack);
    }
}
