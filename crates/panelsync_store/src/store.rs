//! The store contract consumed by the panel services.

use crate::error::StoreResult;
use crate::record::Record;
use crate::transaction::Transaction;
use crate::types::SequenceNumber;

/// A transactional relational store.
///
/// Lookups return `Ok(None)` for absent rows; callers decide whether absence
/// is an error. Writes are buffered in a [`Transaction`] and become visible
/// to other readers only after [`commit`](Store::commit).
pub trait Store: Send + Sync {
    /// Begins a new transaction.
    fn begin(&self) -> StoreResult<Transaction>;

    /// Commits a transaction atomically.
    fn commit(&self, txn: &mut Transaction) -> StoreResult<SequenceNumber>;

    /// Discards a transaction's writes and releases its reservations.
    fn rollback(&self, txn: &mut Transaction) -> StoreResult<()>;

    /// Reads the latest committed version of a row.
    fn get<R: Record>(&self, id: R::Id) -> StoreResult<Option<R>>;

    /// Reads a row as seen by a transaction.
    fn find<R: Record>(&self, txn: &Transaction, id: R::Id) -> StoreResult<Option<R>>;

    /// Returns the lowest-id row matching `predicate`, as seen by a transaction.
    fn find_first_where<R, F>(&self, txn: &Transaction, predicate: F) -> StoreResult<Option<R>>
    where
        R: Record,
        F: Fn(&R) -> bool;

    /// Counts rows matching `predicate`, as seen by a transaction.
    fn find_count_where<R, F>(&self, txn: &Transaction, predicate: F) -> StoreResult<usize>
    where
        R: Record,
        F: Fn(&R) -> bool;

    /// Inserts a row with a freshly allocated id.
    fn create<R: Record>(&self, txn: &mut Transaction, fields: R::Fields) -> StoreResult<R>;

    /// Applies a changeset. Returns `false` when nothing changed.
    fn update<R: Record>(
        &self,
        txn: &mut Transaction,
        id: R::Id,
        changes: R::Changes,
    ) -> StoreResult<bool>;

    /// Deletes a row. Returns `false` when the row did not exist.
    fn delete<R: Record>(&self, txn: &mut Transaction, id: R::Id) -> StoreResult<bool>;

    /// Executes a function within a transaction.
    ///
    /// If the function returns `Ok`, the transaction is committed.
    /// If it returns `Err`, the transaction is rolled back.
    fn transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        Self: Sized,
        F: FnOnce(&mut Transaction) -> StoreResult<T>,
    {
        let mut txn = self.begin()?;
        match f(&mut txn) {
            Ok(value) => {
                self.commit(&mut txn)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback(&mut txn) {
                    tracing::error!(txn = %txn.id(), error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
