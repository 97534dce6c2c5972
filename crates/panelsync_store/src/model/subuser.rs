//! Delegated access grants.

use crate::error::{StoreError, StoreResult};
use crate::record::{assign, Record, UniqueKey};
use crate::types::{ServerId, SubuserId, Table, UserId};
use serde::{Deserialize, Serialize};

/// Scoped access of a non-owner user to one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subuser {
    /// Primary key.
    pub id: SubuserId,
    /// Grantee.
    pub user_id: UserId,
    /// Target server.
    pub server_id: ServerId,
    /// Per-grant key registered with the daemon. Generated, never caller supplied.
    pub daemon_secret: String,
    /// Granted panel permissions, in grant order.
    pub permissions: Vec<String>,
}

/// Insert payload for [`Subuser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubuser {
    /// Grantee.
    pub user_id: UserId,
    /// Target server.
    pub server_id: ServerId,
    /// Generated daemon key.
    pub daemon_secret: String,
    /// Granted permissions.
    pub permissions: Vec<String>,
}

/// Changeset for [`Subuser`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubuserChanges {
    /// Replacement permission set.
    pub permissions: Option<Vec<String>>,
    /// Rotated daemon key.
    pub daemon_secret: Option<String>,
}

impl Subuser {
    /// One grant per (user, server) pair.
    pub const PAIR_UNIQUE: &'static str = "subusers.user_server";
    /// Daemon keys are unique across grants.
    pub const SECRET_UNIQUE: &'static str = "subusers.daemon_secret";
}

impl Record for Subuser {
    type Id = SubuserId;
    type Fields = NewSubuser;
    type Changes = SubuserChanges;

    const TABLE: Table = Table::Subusers;

    fn id(&self) -> SubuserId {
        self.id
    }

    fn from_fields(id: SubuserId, fields: NewSubuser) -> Self {
        Self {
            id,
            user_id: fields.user_id,
            server_id: fields.server_id,
            daemon_secret: fields.daemon_secret,
            permissions: fields.permissions,
        }
    }

    fn apply(&mut self, changes: SubuserChanges) -> bool {
        let mut changed = false;
        assign(&mut self.permissions, changes.permissions, &mut changed);
        assign(&mut self.daemon_secret, changes.daemon_secret, &mut changed);
        changed
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new(
                Self::PAIR_UNIQUE,
                format!("{}:{}", self.user_id.as_u64(), self.server_id.as_u64()),
            ),
            UniqueKey::new(Self::SECRET_UNIQUE, self.daemon_secret.clone()),
        ]
    }

    fn validate(&self) -> StoreResult<()> {
        if self.permissions.is_empty() {
            return Err(StoreError::validation(
                Table::Subusers,
                "a subuser needs at least one permission",
            ));
        }
        if self.daemon_secret.is_empty() {
            return Err(StoreError::validation(
                Table::Subusers,
                "daemon secret must not be empty",
            ));
        }
        Ok(())
    }
}
