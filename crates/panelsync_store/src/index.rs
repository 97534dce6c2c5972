//! Unique indexes and row claims with write-time reservations.
//!
//! A key written by an open transaction is reserved immediately, so a second
//! transaction claiming the same key fails when it writes, not when it
//! commits. Commit re-verifies against the committed index before applying.
//!
//! Rows are claimed the same way: the first open transaction to update or
//! delete a committed row owns it until it finishes, and any other writer of
//! that row fails with a conflict before staging anything.

use crate::error::{StoreError, StoreResult};
use crate::record::UniqueKey;
use crate::transaction::{PendingWrite, Transaction};
use crate::types::{Table, TransactionId};
use std::collections::HashMap;

type RowRef = (Table, u64);

/// Committed keys plus in-flight reservations for every table.
#[derive(Debug, Default, Clone)]
pub(crate) struct UniqueIndex {
    committed: HashMap<UniqueKey, RowRef>,
    reserved: HashMap<UniqueKey, (TransactionId, RowRef)>,
    row_keys: HashMap<RowRef, Vec<UniqueKey>>,
    claims: HashMap<RowRef, TransactionId>,
}

impl UniqueIndex {
    /// Rebuilds the committed index from per-row key lists.
    pub(crate) fn from_rows(rows: impl IntoIterator<Item = (RowRef, Vec<UniqueKey>)>) -> Self {
        let mut index = Self::default();
        for (row, keys) in rows {
            index.insert_committed(row, keys);
        }
        index
    }

    /// Keys held by a committed row.
    pub(crate) fn keys_of(&self, row: RowRef) -> &[UniqueKey] {
        self.row_keys.get(&row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reserves `keys` for `row` on behalf of `txn`.
    ///
    /// Earlier reservations the transaction made for the same row are
    /// released first, so rewriting a row twice does not leak keys.
    pub(crate) fn reserve(
        &mut self,
        txn: &Transaction,
        row: RowRef,
        keys: &[UniqueKey],
    ) -> StoreResult<()> {
        for key in keys {
            if let Some(&holder) = self.committed.get(key) {
                if holder != row && !releases(txn, holder, key) {
                    return Err(violation(row.0, key));
                }
            }
            if let Some(&(owner, held)) = self.reserved.get(key) {
                if owner != txn.id() || held != row {
                    return Err(violation(row.0, key));
                }
            }
        }

        let txid = txn.id();
        self.reserved
            .retain(|_, &mut (owner, held)| !(owner == txid && held == row));
        for key in keys {
            self.reserved.insert(key.clone(), (txid, row));
        }
        Ok(())
    }

    /// Claims `row` for `txn`; fails if another open transaction holds it.
    pub(crate) fn claim(&mut self, txn: &Transaction, row: RowRef) -> StoreResult<()> {
        match self.claims.get(&row) {
            Some(&owner) if owner != txn.id() => {
                Err(StoreError::conflict(row.0, row.1, owner))
            }
            _ => {
                self.claims.insert(row, txn.id());
                Ok(())
            }
        }
    }

    /// Drops every reservation and claim held by a transaction.
    pub(crate) fn release(&mut self, txid: TransactionId) {
        self.reserved.retain(|_, &mut (owner, _)| owner != txid);
        self.claims.retain(|_, &mut owner| owner != txid);
    }

    /// Checks the transaction's final row versions against committed keys
    /// and against each other.
    pub(crate) fn verify(&self, txn: &Transaction) -> StoreResult<()> {
        let mut staged: HashMap<&UniqueKey, RowRef> = HashMap::new();
        for (&row, write) in txn.pending_writes() {
            if let PendingWrite::Put { keys, .. } = write {
                for key in keys {
                    if let Some(other) = staged.insert(key, row) {
                        if other != row {
                            return Err(violation(row.0, key));
                        }
                    }
                    if let Some(&holder) = self.committed.get(key) {
                        if holder != row && !releases(txn, holder, key) {
                            return Err(violation(row.0, key));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Moves a verified transaction's keys into the committed index.
    pub(crate) fn apply(&mut self, txn: &Transaction) {
        self.release(txn.id());
        for (&row, write) in txn.pending_writes() {
            if let Some(old) = self.row_keys.remove(&row) {
                for key in old {
                    if self.committed.get(&key) == Some(&row) {
                        self.committed.remove(&key);
                    }
                }
            }
            if let PendingWrite::Put { keys, .. } = write {
                self.insert_committed(row, keys.clone());
            }
        }
    }

    /// Number of outstanding key reservations and row claims.
    pub(crate) fn reservation_count(&self) -> usize {
        self.reserved.len() + self.claims.len()
    }

    fn insert_committed(&mut self, row: RowRef, keys: Vec<UniqueKey>) {
        for key in &keys {
            self.committed.insert(key.clone(), row);
        }
        self.row_keys.insert(row, keys);
    }
}

/// Whether `txn` frees `key` from `holder` by deleting or rewriting that row.
fn releases(txn: &Transaction, holder: RowRef, key: &UniqueKey) -> bool {
    match txn.get_pending_write(holder.0, holder.1) {
        Some(PendingWrite::Delete) => true,
        Some(PendingWrite::Put { keys, .. }) => !keys.contains(key),
        None => false,
    }
}

fn violation(table: Table, key: &UniqueKey) -> StoreError {
    StoreError::UniqueViolation {
        table,
        constraint: key.constraint.clone(),
        value: key.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(value: &str) -> UniqueKey {
        UniqueKey::new("users.email", value)
    }

    #[test]
    fn reservation_blocks_other_transactions() {
        let mut index = UniqueIndex::default();
        let t1 = Transaction::new(TransactionId::new(1));
        let t2 = Transaction::new(TransactionId::new(2));

        index.reserve(&t1, (Table::Users, 1), &[key("a@x.io")]).unwrap();
        let err = index
            .reserve(&t2, (Table::Users, 2), &[key("a@x.io")])
            .unwrap_err();
        assert_eq!(err.violated_constraint(), Some("users.email"));

        index.release(t1.id());
        index.reserve(&t2, (Table::Users, 2), &[key("a@x.io")]).unwrap();
    }

    #[test]
    fn committed_row_keeps_its_own_key() {
        let mut index = UniqueIndex::from_rows([((Table::Users, 1), vec![key("a@x.io")])]);
        let txn = Transaction::new(TransactionId::new(3));

        index.reserve(&txn, (Table::Users, 1), &[key("a@x.io")]).unwrap();
        assert!(index
            .reserve(&txn, (Table::Users, 2), &[key("a@x.io")])
            .is_err());
    }

    #[test]
    fn rewriting_a_row_releases_stale_reservations() {
        let mut index = UniqueIndex::default();
        let txn = Transaction::new(TransactionId::new(1));

        index.reserve(&txn, (Table::Users, 1), &[key("old@x.io")]).unwrap();
        index.reserve(&txn, (Table::Users, 1), &[key("new@x.io")]).unwrap();
        assert_eq!(index.reservation_count(), 1);
    }

    #[test]
    fn one_transaction_cannot_reserve_a_key_for_two_rows() {
        let mut index = UniqueIndex::default();
        let txn = Transaction::new(TransactionId::new(1));

        index.reserve(&txn, (Table::Users, 1), &[key("a@x.io")]).unwrap();
        let err = index
            .reserve(&txn, (Table::Users, 2), &[key("a@x.io")])
            .unwrap_err();
        assert_eq!(err.violated_constraint(), Some("users.email"));
    }

    #[test]
    fn verify_rejects_duplicate_keys_within_a_transaction() {
        let index = UniqueIndex::default();
        let mut txn = Transaction::new(TransactionId::new(1));
        txn.put(Table::Users, 1, vec![1], vec![key("a@x.io")]).unwrap();
        txn.put(Table::Users, 2, vec![2], vec![key("a@x.io")]).unwrap();

        let err = index.verify(&txn).unwrap_err();
        assert_eq!(err.violated_constraint(), Some("users.email"));
    }

    #[test]
    fn claims_are_exclusive_until_released() {
        let mut index = UniqueIndex::default();
        let t1 = Transaction::new(TransactionId::new(1));
        let t2 = Transaction::new(TransactionId::new(2));

        index.claim(&t1, (Table::Subusers, 4)).unwrap();
        index.claim(&t1, (Table::Subusers, 4)).unwrap();
        let err = index.claim(&t2, (Table::Subusers, 4)).unwrap_err();
        assert!(matches!(err, StoreError::TransactionConflict { id: 4, .. }));
        assert_eq!(index.reservation_count(), 1);

        index.release(t1.id());
        index.claim(&t2, (Table::Subusers, 4)).unwrap();
    }
}
