//! Transaction state.

use crate::error::{StoreError, StoreResult};
use crate::record::UniqueKey;
use crate::types::{Table, TransactionId};
use std::collections::BTreeMap;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// Represents a pending write in a transaction.
#[derive(Debug, Clone)]
pub enum PendingWrite {
    /// Insert or update a row.
    Put {
        /// Row payload (CBOR bytes).
        payload: Vec<u8>,
        /// Unique keys claimed by the new row version.
        keys: Vec<UniqueKey>,
    },
    /// Delete a row.
    Delete,
}

/// An open unit of work against the store.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    /// Pending writes: (table, row id) -> write operation.
    writes: BTreeMap<(Table, u64), PendingWrite>,
}

impl Transaction {
    /// Creates a new transaction.
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            writes: BTreeMap::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Records a put operation.
    pub(crate) fn put(
        &mut self,
        table: Table,
        row: u64,
        payload: Vec<u8>,
        keys: Vec<UniqueKey>,
    ) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes
            .insert((table, row), PendingWrite::Put { payload, keys });
        Ok(())
    }

    /// Records a delete operation.
    pub(crate) fn delete(&mut self, table: Table, row: u64) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes.insert((table, row), PendingWrite::Delete);
        Ok(())
    }

    /// Gets a pending write for a row.
    #[must_use]
    pub fn get_pending_write(&self, table: Table, row: u64) -> Option<&PendingWrite> {
        self.writes.get(&(table, row))
    }

    /// Returns the pending writes of one table, in row order.
    pub fn pending_in(&self, table: Table) -> impl Iterator<Item = (u64, &PendingWrite)> {
        self.writes
            .range((table, 0)..=(table, u64::MAX))
            .map(|(&(_, row), write)| (row, write))
    }

    /// Returns all pending writes.
    pub fn pending_writes(&self) -> impl Iterator<Item = (&(Table, u64), &PendingWrite)> {
        self.writes.iter()
    }

    /// Returns the number of pending writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Marks the transaction as committed.
    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    /// Marks the transaction as rolled back and drops its buffer.
    pub(crate) fn mark_rolled_back(&mut self) {
        self.state = TransactionState::RolledBack;
        self.writes.clear();
    }

    /// Ensures the transaction is active.
    pub(crate) fn ensure_active(&self) -> StoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(StoreError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::RolledBack => Err(StoreError::invalid_operation(
                "transaction already rolled back",
            )),
        }
    }
}
