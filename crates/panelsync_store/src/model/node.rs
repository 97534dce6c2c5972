//! Daemon host registrations.

use crate::error::{StoreError, StoreResult};
use crate::record::{assign, Record, UniqueKey};
use crate::types::{NodeId, Table};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registration record of one remote daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Primary key, stable for the node's lifetime.
    pub id: NodeId,
    /// External identifier.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Hostname or address the daemon listens on.
    pub fqdn: String,
    /// `http` or `https`.
    pub scheme: String,
    /// Whether TLS is terminated by a proxy in front of the daemon.
    pub behind_proxy: bool,
    /// Daemon API port.
    pub daemon_listen: u16,
    /// Daemon SFTP port.
    pub daemon_sftp: u16,
    /// Directory holding server data on the host.
    pub daemon_base: String,
    /// Upload size limit in MiB.
    pub upload_size: u32,
    /// Token the panel presents to the daemon. Rotates only on request.
    pub daemon_secret: String,
}

/// Insert payload for [`Node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Hostname or address.
    pub fqdn: String,
    /// `http` or `https`.
    pub scheme: String,
    /// Whether TLS is terminated by a proxy.
    pub behind_proxy: bool,
    /// Daemon API port.
    pub daemon_listen: u16,
    /// Daemon SFTP port.
    pub daemon_sftp: u16,
    /// Server data directory.
    pub daemon_base: String,
    /// Upload size limit in MiB.
    pub upload_size: u32,
    /// Initial daemon secret.
    pub daemon_secret: String,
}

/// Changeset for [`Node`]. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeChanges {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<Option<String>>,
    /// New hostname.
    pub fqdn: Option<String>,
    /// New scheme.
    pub scheme: Option<String>,
    /// New proxy flag.
    pub behind_proxy: Option<bool>,
    /// New API port.
    pub daemon_listen: Option<u16>,
    /// New SFTP port.
    pub daemon_sftp: Option<u16>,
    /// New data directory.
    pub daemon_base: Option<String>,
    /// New upload limit.
    pub upload_size: Option<u32>,
    /// Rotated daemon secret.
    pub daemon_secret: Option<String>,
}

impl Node {
    /// Unique index over daemon secrets.
    pub const SECRET_UNIQUE: &'static str = "nodes.daemon_secret";

    /// Returns the daemon API base URL, e.g. `https://node.example.com:8080`.
    #[must_use]
    pub fn connection_address(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.fqdn, self.daemon_listen)
    }

    /// Whether the daemon itself should terminate TLS.
    #[must_use]
    pub fn uses_ssl(&self) -> bool {
        self.scheme == "https" && !self.behind_proxy
    }
}

impl Record for Node {
    type Id = NodeId;
    type Fields = NewNode;
    type Changes = NodeChanges;

    const TABLE: Table = Table::Nodes;

    fn id(&self) -> NodeId {
        self.id
    }

    fn from_fields(id: NodeId, fields: NewNode) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            name: fields.name,
            description: fields.description,
            fqdn: fields.fqdn,
            scheme: fields.scheme,
            behind_proxy: fields.behind_proxy,
            daemon_listen: fields.daemon_listen,
            daemon_sftp: fields.daemon_sftp,
            daemon_base: fields.daemon_base,
            upload_size: fields.upload_size,
            daemon_secret: fields.daemon_secret,
        }
    }

    fn apply(&mut self, changes: NodeChanges) -> bool {
        let mut changed = false;
        assign(&mut self.name, changes.name, &mut changed);
        assign(&mut self.description, changes.description, &mut changed);
        assign(&mut self.fqdn, changes.fqdn, &mut changed);
        assign(&mut self.scheme, changes.scheme, &mut changed);
        assign(&mut self.behind_proxy, changes.behind_proxy, &mut changed);
        assign(&mut self.daemon_listen, changes.daemon_listen, &mut changed);
        assign(&mut self.daemon_sftp, changes.daemon_sftp, &mut changed);
        assign(&mut self.daemon_base, changes.daemon_base, &mut changed);
        assign(&mut self.upload_size, changes.upload_size, &mut changed);
        assign(&mut self.daemon_secret, changes.daemon_secret, &mut changed);
        changed
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(Self::SECRET_UNIQUE, self.daemon_secret.clone())]
    }

    fn validate(&self) -> StoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::validation(Table::Nodes, "name must not be empty"));
        }
        if self.fqdn.trim().is_empty() || self.fqdn.contains(char::is_whitespace) {
            return Err(StoreError::validation(
                Table::Nodes,
                format!("{:?} is not a valid hostname", self.fqdn),
            ));
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(StoreError::validation(
                Table::Nodes,
                format!("scheme must be http or https, got {:?}", self.scheme),
            ));
        }
        if self.daemon_secret.is_empty() {
            return Err(StoreError::validation(
                Table::Nodes,
                "daemon secret must not be empty",
            ));
        }
        Ok(())
    }
}
