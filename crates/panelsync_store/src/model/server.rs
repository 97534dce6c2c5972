//! Daemon-managed workloads.

use crate::error::{StoreError, StoreResult};
use crate::record::{assign, Record, UniqueKey};
use crate::types::{NodeId, ServerId, Table, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A workload hosted by one daemon and owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Primary key.
    pub id: ServerId,
    /// Token the daemon knows the server by.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner_id: UserId,
    /// Hosting node.
    pub node_id: NodeId,
}

/// Insert payload for [`Server`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewServer {
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner_id: UserId,
    /// Hosting node.
    pub node_id: NodeId,
}

/// Changeset for [`Server`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerChanges {
    /// New display name.
    pub name: Option<String>,
    /// New owner.
    pub owner_id: Option<UserId>,
}

impl Server {
    /// Unique index over daemon-facing uuids.
    pub const UUID_UNIQUE: &'static str = "servers.uuid";
}

impl Record for Server {
    type Id = ServerId;
    type Fields = NewServer;
    type Changes = ServerChanges;

    const TABLE: Table = Table::Servers;

    fn id(&self) -> ServerId {
        self.id
    }

    fn from_fields(id: ServerId, fields: NewServer) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            name: fields.name,
            owner_id: fields.owner_id,
            node_id: fields.node_id,
        }
    }

    fn apply(&mut self, changes: ServerChanges) -> bool {
        let mut changed = false;
        assign(&mut self.name, changes.name, &mut changed);
        assign(&mut self.owner_id, changes.owner_id, &mut changed);
        changed
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(Self::UUID_UNIQUE, self.uuid.to_string())]
    }

    fn validate(&self) -> StoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::validation(Table::Servers, "name must not be empty"));
        }
        Ok(())
    }
}
