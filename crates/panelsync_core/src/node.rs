//! Node update service.

use crate::context::ServiceContext;
use crate::coordinator::SyncCoordinator;
use crate::error::{ServiceError, ServiceResult};
use crate::resolve::NodeRef;
use panelsync_daemon::{HttpClient, NodeConfiguration};
use panelsync_store::{Node, NodeChanges, RowKey, Store, Table};
use std::sync::Arc;

/// Requested changes to a node.
///
/// `None` leaves a field untouched. `reset_secret` rotates the daemon secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeChangeset {
    /// New display name.
    pub name: Option<String>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New hostname.
    pub fqdn: Option<String>,
    /// New scheme, `http` or `https`.
    pub scheme: Option<String>,
    /// Whether the daemon sits behind a TLS-terminating proxy.
    pub behind_proxy: Option<bool>,
    /// New daemon API port.
    pub daemon_listen: Option<u16>,
    /// New SFTP port.
    pub daemon_sftp: Option<u16>,
    /// New data directory.
    pub daemon_base: Option<String>,
    /// New upload limit in megabytes.
    pub upload_size: Option<u32>,
    /// Generate a new daemon secret.
    pub reset_secret: bool,
}

impl NodeChangeset {
    /// Creates an empty changeset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a secret rotation.
    #[must_use]
    pub fn reset_secret(mut self) -> Self {
        self.reset_secret = true;
        self
    }

    /// Converts into store changes, drawing a new secret when a reset is requested.
    ///
    /// Without a reset the secret field is absent from the changes.
    pub fn into_changes(self, new_secret: impl FnOnce() -> String) -> NodeChanges {
        NodeChanges {
            name: self.name,
            description: self.description,
            fqdn: self.fqdn,
            scheme: self.scheme,
            behind_proxy: self.behind_proxy,
            daemon_listen: self.daemon_listen,
            daemon_sftp: self.daemon_sftp,
            daemon_base: self.daemon_base,
            upload_size: self.upload_size,
            daemon_secret: self.reset_secret.then(new_secret),
        }
    }
}

/// Updates nodes and pushes the new configuration to their daemon.
pub struct NodeUpdateService<S, C> {
    ctx: Arc<ServiceContext<S, C>>,
}

impl<S: Store, C: HttpClient> NodeUpdateService<S, C> {
    /// Creates the service.
    pub fn new(ctx: Arc<ServiceContext<S, C>>) -> Self {
        Self { ctx }
    }

    /// Applies `changeset` to `node` and pushes the result to the daemon.
    ///
    /// The daemon is addressed at the node's updated address but
    /// authenticated with the secret it had before this call, since the
    /// daemon does not know a rotated secret yet. Returns whether any field
    /// changed. A failed daemon call rolls the update back.
    pub fn handle(&self, node: impl Into<NodeRef>, changeset: NodeChangeset) -> ServiceResult<bool> {
        let ctx = &*self.ctx;
        let node = node.into().resolve(ctx.store())?;
        let previous_secret = node.daemon_secret.clone();
        let changes = changeset.into_changes(|| ctx.generate_secret());
        let panel_url = ctx.config().panel_url.as_str();

        let (changed, _) = SyncCoordinator::new(ctx).run(
            "node.update",
            |store, txn| {
                let changed = store.update::<Node>(txn, node.id, changes)?;
                let fresh = store
                    .find::<Node>(txn, node.id)?
                    .ok_or_else(|| ServiceError::not_found(Table::Nodes, node.id.raw()))?;
                Ok((changed, fresh))
            },
            |daemon, updated: &(bool, Node)| {
                let fresh = &updated.1;
                daemon
                    .for_node(fresh)
                    .set_access_token(previous_secret.as_str())
                    .update_configuration(&NodeConfiguration::for_node(fresh, panel_url))
            },
        )?;
        Ok(changed)
    }
}
