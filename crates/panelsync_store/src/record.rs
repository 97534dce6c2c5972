//! The record abstraction shared by every table.

use crate::error::StoreResult;
use crate::types::{RowKey, Table};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A key claimed in a unique index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniqueKey {
    /// Constraint name, e.g. `users.email`.
    pub constraint: String,
    /// Normalized key value.
    pub value: String,
}

impl UniqueKey {
    /// Creates a unique key.
    pub fn new(constraint: &'static str, value: impl Into<String>) -> Self {
        Self {
            constraint: constraint.to_string(),
            value: value.into(),
        }
    }
}

/// A row type stored in one table.
///
/// Rows are persisted as CBOR. `Fields` is the insert payload (everything but
/// the generated id), `Changes` is a sparse changeset for updates.
pub trait Record: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Primary key type.
    type Id: RowKey;
    /// Insert payload.
    type Fields;
    /// Update changeset.
    type Changes;

    /// Table holding this record type.
    const TABLE: Table;

    /// Returns the primary key.
    fn id(&self) -> Self::Id;

    /// Builds a row from a freshly allocated id and its insert payload.
    fn from_fields(id: Self::Id, fields: Self::Fields) -> Self;

    /// Applies a changeset. Returns `true` if any column changed.
    fn apply(&mut self, changes: Self::Changes) -> bool;

    /// Keys this row claims in the table's unique indexes.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }

    /// Checks column constraints before the row is written.
    fn validate(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Assigns `value` to `slot` when it differs, recording whether anything changed.
pub(crate) fn assign<T: PartialEq>(slot: &mut T, value: Option<T>, changed: &mut bool) {
    if let Some(value) = value {
        if *slot != value {
            *slot = value;
            *changed = true;
        }
    }
}
