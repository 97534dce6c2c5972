//! Server commands.

use super::{App, CliError};
use panelsync_core::ServiceError;
use panelsync_store::{NewServer, Node, NodeId, Server, Store, Table, User, UserId};

/// Creates a server record owned by `owner` on `node`.
///
/// The daemon is not contacted; provisioning the workload is out of scope.
pub fn create(app: &App, name: String, owner: u64, node: u64) -> Result<(), CliError> {
    let db = app.db();
    if db.get::<User>(UserId::new(owner))?.is_none() {
        return Err(ServiceError::not_found(Table::Users, owner).into());
    }
    if db.get::<Node>(NodeId::new(node))?.is_none() {
        return Err(ServiceError::not_found(Table::Nodes, node).into());
    }

    let fields = NewServer {
        name,
        owner_id: UserId::new(owner),
        node_id: NodeId::new(node),
    };
    let server: Server = db
        .transaction(|txn| db.create::<Server>(txn, fields))
        .map_err(ServiceError::from)?;

    app.emit(&server, |server| {
        println!("Created server {} ({})", server.id, server.uuid);
    })
}

/// Lists all servers.
pub fn list(app: &App) -> Result<(), CliError> {
    let servers = app.db().list::<Server>()?;
    app.emit(&servers, |servers| {
        println!("{:<10} {:<24} {:<10} {:<10} UUID", "ID", "NAME", "OWNER", "NODE");
        for server in servers {
            println!(
                "{:<10} {:<24} {:<10} {:<10} {}",
                server.id.as_u64(),
                server.name,
                server.owner_id.as_u64(),
                server.node_id.as_u64(),
                server.uuid
            );
        }
    })
}
