//! References to entities given either by id or by value.

use crate::error::{ServiceError, ServiceResult};
use panelsync_store::{Node, NodeId, Record, RowKey, Server, ServerId, Store};

/// A server given by id or already loaded.
#[derive(Debug, Clone)]
pub enum ServerRef {
    /// Load by id.
    Id(ServerId),
    /// Use as is.
    Entity(Server),
}

/// A node given by id or already loaded.
#[derive(Debug, Clone)]
pub enum NodeRef {
    /// Load by id.
    Id(NodeId),
    /// Use as is.
    Entity(Node),
}

impl ServerRef {
    /// Resolves to a committed server.
    pub fn resolve<S: Store>(self, store: &S) -> ServiceResult<Server> {
        match self {
            ServerRef::Id(id) => load(store, id),
            ServerRef::Entity(server) => Ok(server),
        }
    }
}

impl NodeRef {
    /// Resolves to a committed node.
    pub fn resolve<S: Store>(self, store: &S) -> ServiceResult<Node> {
        match self {
            NodeRef::Id(id) => load(store, id),
            NodeRef::Entity(node) => Ok(node),
        }
    }
}

fn load<S: Store, R: Record>(store: &S, id: R::Id) -> ServiceResult<R> {
    store
        .get::<R>(id)?
        .ok_or_else(|| ServiceError::not_found(R::TABLE, id.raw()))
}

impl From<ServerId> for ServerRef {
    fn from(id: ServerId) -> Self {
        ServerRef::Id(id)
    }
}

impl From<Server> for ServerRef {
    fn from(server: Server) -> Self {
        ServerRef::Entity(server)
    }
}

impl From<&Server> for ServerRef {
    fn from(server: &Server) -> Self {
        ServerRef::Entity(server.clone())
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        NodeRef::Id(id)
    }
}

impl From<Node> for NodeRef {
    fn from(node: Node) -> Self {
        NodeRef::Entity(node)
    }
}

impl From<&Node> for NodeRef {
    fn from(node: &Node) -> Self {
        NodeRef::Entity(node.clone())
    }
}
