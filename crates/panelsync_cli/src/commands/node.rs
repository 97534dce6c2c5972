//! Node commands.

use super::{App, CliError};
use panelsync_core::{NodeChangeset, NodeUpdateService, ServiceError};
use panelsync_store::{NewNode, Node, NodeId, Store};
use serde::Serialize;

/// Arguments for registering a node.
pub struct NodeSpec {
    /// Display name.
    pub name: String,
    /// Hostname.
    pub fqdn: String,
    /// `http` or `https`.
    pub scheme: String,
    /// TLS terminated by a proxy.
    pub behind_proxy: bool,
    /// Daemon API port.
    pub listen: u16,
    /// SFTP port.
    pub sftp: u16,
    /// Data directory.
    pub base: String,
    /// Upload limit in megabytes.
    pub upload_size: u32,
}

/// Node as shown to the operator; the secret is never printed.
#[derive(Serialize)]
struct NodeView {
    id: u64,
    name: String,
    address: String,
    sftp: u16,
    base: String,
    upload_size: u32,
}

impl From<&Node> for NodeView {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.as_u64(),
            name: node.name.clone(),
            address: node.connection_address(),
            sftp: node.daemon_sftp,
            base: node.daemon_base.clone(),
            upload_size: node.upload_size,
        }
    }
}

/// Result of `node update`.
#[derive(Serialize)]
struct UpdateResult {
    /// Node id.
    id: u64,
    /// Whether any stored field changed.
    changed: bool,
    /// Whether the daemon secret was rotated.
    secret_rotated: bool,
}

/// Registers a node with a freshly generated daemon secret.
pub fn create(app: &App, spec: NodeSpec) -> Result<(), CliError> {
    let ctx = app.ctx();
    let fields = NewNode {
        name: spec.name,
        description: None,
        fqdn: spec.fqdn,
        scheme: spec.scheme,
        behind_proxy: spec.behind_proxy,
        daemon_listen: spec.listen,
        daemon_sftp: spec.sftp,
        daemon_base: spec.base,
        upload_size: spec.upload_size,
        daemon_secret: ctx.generate_secret(),
    };
    let db = app.db();
    let node: Node = db
        .transaction(|txn| db.create::<Node>(txn, fields))
        .map_err(ServiceError::from)?;

    app.emit(&NodeView::from(&node), |view| {
        println!("Created node {} at {}", view.id, view.address);
    })
}

/// Applies `changeset` to node `id` and pushes the new configuration.
pub fn update(app: &App, id: u64, changeset: NodeChangeset) -> Result<(), CliError> {
    let secret_rotated = changeset.reset_secret;
    let changed = NodeUpdateService::new(app.ctx()).handle(NodeId::new(id), changeset)?;
    let result = UpdateResult {
        id,
        changed,
        secret_rotated,
    };
    app.emit(&result, |result| {
        if result.changed {
            println!("Updated node {}", result.id);
        } else {
            println!("Node {} unchanged; configuration pushed", result.id);
        }
        if result.secret_rotated {
            println!("Daemon secret rotated");
        }
    })
}

/// Lists all nodes.
pub fn list(app: &App) -> Result<(), CliError> {
    let nodes: Vec<NodeView> = app.db().list::<Node>()?.iter().map(NodeView::from).collect();
    app.emit(&nodes, |nodes| {
        println!("{:<10} {:<20} {:<40} SFTP", "ID", "NAME", "ADDRESS");
        for node in nodes {
            println!("{:<10} {:<20} {:<40} {}", node.id, node.name, node.address, node.sftp);
        }
    })
}
