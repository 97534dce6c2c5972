//! The record database.

use crate::codec;
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::index::UniqueIndex;
use crate::record::Record;
use crate::snapshot::{Snapshot, SnapshotFile, SnapshotRow, SNAPSHOT_FORMAT};
use crate::store::Store;
use crate::transaction::{PendingWrite, Transaction};
use crate::types::{RowKey, SequenceNumber, Table, TransactionId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Committed rows, unique indexes and row counters.
#[derive(Debug, Default, Clone)]
struct Tables {
    rows: BTreeMap<(Table, u64), Vec<u8>>,
    index: UniqueIndex,
    next_ids: BTreeMap<Table, u64>,
}

impl Tables {
    fn allocate(&mut self, table: Table) -> u64 {
        let next = self.next_ids.entry(table).or_insert(1);
        let id = *next;
        *next += 1;
        id
    }

    fn committed_in(&self, table: Table) -> impl Iterator<Item = (u64, &Vec<u8>)> {
        self.rows
            .range((table, 0)..=(table, u64::MAX))
            .map(|(&(_, row), payload)| (row, payload))
    }

    fn apply(&mut self, txn: &Transaction) {
        for (&key, write) in txn.pending_writes() {
            match write {
                PendingWrite::Put { payload, .. } => {
                    self.rows.insert(key, payload.clone());
                }
                PendingWrite::Delete => {
                    self.rows.remove(&key);
                }
            }
        }
        self.index.apply(txn);
    }

    fn to_snapshot(&self, committed_seq: u64) -> Snapshot {
        Snapshot {
            format: SNAPSHOT_FORMAT,
            committed_seq,
            next_ids: self.next_ids.iter().map(|(&t, &n)| (t, n)).collect(),
            rows: self
                .rows
                .iter()
                .map(|(&(table, id), payload)| SnapshotRow {
                    table,
                    id,
                    payload: payload.clone(),
                    keys: self.index.keys_of((table, id)).to_vec(),
                })
                .collect(),
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        let index = UniqueIndex::from_rows(
            snapshot
                .rows
                .iter()
                .map(|row| ((row.table, row.id), row.keys.clone())),
        );
        Self {
            rows: snapshot
                .rows
                .into_iter()
                .map(|row| ((row.table, row.id), row.payload))
                .collect(),
            index,
            next_ids: snapshot.next_ids.into_iter().collect(),
        }
    }
}

/// A transactional record database.
///
/// Rows live in memory as CBOR payloads. A database opened with
/// [`Database::open`] additionally rewrites a snapshot file on every commit.
///
/// Transactions do not take a writer lock for their lifetime: several may be
/// open at once. Conflicting unique keys and concurrent writes to one row
/// are rejected at write time.
pub struct Database {
    config: Config,
    tables: RwLock<Tables>,
    next_txid: AtomicU64,
    committed_seq: AtomicU64,
    active_txns: RwLock<Vec<TransactionId>>,
    snapshot: Option<SnapshotFile>,
}

impl Database {
    /// Opens a database that is never persisted.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self {
            config: Config::default(),
            tables: RwLock::new(Tables::default()),
            next_txid: AtomicU64::new(1),
            committed_seq: AtomicU64::new(0),
            active_txns: RwLock::new(Vec::new()),
            snapshot: None,
        }
    }

    /// Opens (or creates) a database persisted at `path`.
    pub fn open(path: &Path, config: Config) -> StoreResult<Self> {
        let (file, existing) =
            SnapshotFile::open(path, config.create_if_missing, config.sync_on_commit)?;
        let (tables, committed_seq) = match existing {
            Some(snapshot) => {
                let seq = snapshot.committed_seq;
                (Tables::from_snapshot(snapshot), seq)
            }
            None => (Tables::default(), 0),
        };
        tracing::debug!(
            path = %file.path().display(),
            rows = tables.rows.len(),
            committed_seq,
            "opened database"
        );

        Ok(Self {
            config,
            tables: RwLock::new(tables),
            next_txid: AtomicU64::new(1),
            committed_seq: AtomicU64::new(committed_seq),
            active_txns: RwLock::new(Vec::new()),
            snapshot: Some(file),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the current committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Returns the number of open transactions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_txns.read().len()
    }

    /// Returns the number of unique keys reserved by open transactions.
    #[must_use]
    pub fn reservation_count(&self) -> usize {
        self.tables.read().index.reservation_count()
    }

    /// Lists all committed rows of a table in id order.
    pub fn list<R: Record>(&self) -> StoreResult<Vec<R>> {
        let tables = self.tables.read();
        tables
            .committed_in(R::TABLE)
            .map(|(_, payload)| codec::decode(payload))
            .collect()
    }

    /// Counts committed rows of a table.
    #[must_use]
    pub fn count<R: Record>(&self) -> usize {
        self.tables.read().committed_in(R::TABLE).count()
    }

    /// Returns the rows of a table as seen by `txn`, in id order.
    fn scan<R: Record>(&self, txn: &Transaction) -> StoreResult<Vec<R>> {
        let mut merged: BTreeMap<u64, Option<Vec<u8>>> = {
            let tables = self.tables.read();
            tables
                .committed_in(R::TABLE)
                .map(|(row, payload)| (row, Some(payload.clone())))
                .collect()
        };
        for (row, write) in txn.pending_in(R::TABLE) {
            let payload = match write {
                PendingWrite::Put { payload, .. } => Some(payload.clone()),
                PendingWrite::Delete => None,
            };
            merged.insert(row, payload);
        }

        merged
            .values()
            .flatten()
            .map(|payload| codec::decode(payload))
            .collect()
    }

    /// Validates a row version and stages it in `txn`.
    fn stage<R: Record>(&self, txn: &mut Transaction, row: &R) -> StoreResult<()> {
        row.validate()?;
        let keys = row.unique_keys();
        let payload = codec::encode(row)?;
        let key = (R::TABLE, row.id().raw());
        self.tables.write().index.reserve(txn, key, &keys)?;
        txn.put(key.0, key.1, payload, keys)
    }

    /// Claims a committed row for `txn` and returns its current payload.
    ///
    /// The claim and the read happen under one lock, so the payload cannot
    /// change until `txn` finishes.
    fn claim(&self, txn: &Transaction, key: (Table, u64)) -> StoreResult<Option<Vec<u8>>> {
        let mut tables = self.tables.write();
        if let Err(err) = tables.index.claim(txn, key) {
            tracing::debug!(txn = %txn.id(), table = %key.0, row = key.1, "row claimed elsewhere");
            return Err(err);
        }
        Ok(tables.rows.get(&key).cloned())
    }

    fn finish(&self, txid: TransactionId) {
        self.active_txns.write().retain(|&id| id != txid);
    }
}

impl Store for Database {
    fn begin(&self) -> StoreResult<Transaction> {
        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        self.active_txns.write().push(txid);
        tracing::trace!(txn = %txid, "begin");
        Ok(Transaction::new(txid))
    }

    fn commit(&self, txn: &mut Transaction) -> StoreResult<SequenceNumber> {
        txn.ensure_active()?;
        let txid = txn.id();
        let mut tables = self.tables.write();

        let sequence = SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst)).next();
        let applied = tables.index.verify(txn).and_then(|()| match &self.snapshot {
            Some(file) => {
                // Memory only advances once the snapshot write succeeded.
                let mut next = tables.clone();
                next.apply(txn);
                file.write(&next.to_snapshot(sequence.as_u64()))?;
                *tables = next;
                Ok(())
            }
            None => {
                tables.apply(txn);
                Ok(())
            }
        });
        if let Err(err) = applied {
            tables.index.release(txid);
            drop(tables);
            tracing::debug!(txn = %txid, error = %err, "commit failed");
            txn.mark_rolled_back();
            self.finish(txid);
            return Err(err);
        }
        self.committed_seq.store(sequence.as_u64(), Ordering::SeqCst);
        drop(tables);

        tracing::trace!(txn = %txid, writes = txn.write_count(), %sequence, "commit");
        txn.mark_committed();
        self.finish(txid);
        Ok(sequence)
    }

    fn rollback(&self, txn: &mut Transaction) -> StoreResult<()> {
        txn.ensure_active()?;
        let txid = txn.id();
        self.tables.write().index.release(txid);
        tracing::trace!(txn = %txid, discarded = txn.write_count(), "rollback");
        txn.mark_rolled_back();
        self.finish(txid);
        Ok(())
    }

    fn get<R: Record>(&self, id: R::Id) -> StoreResult<Option<R>> {
        let tables = self.tables.read();
        tables
            .rows
            .get(&(R::TABLE, id.raw()))
            .map(|payload| codec::decode(payload))
            .transpose()
    }

    fn find<R: Record>(&self, txn: &Transaction, id: R::Id) -> StoreResult<Option<R>> {
        match txn.get_pending_write(R::TABLE, id.raw()) {
            Some(PendingWrite::Put { payload, .. }) => codec::decode(payload).map(Some),
            Some(PendingWrite::Delete) => Ok(None),
            None => self.get(id),
        }
    }

    fn find_first_where<R, F>(&self, txn: &Transaction, predicate: F) -> StoreResult<Option<R>>
    where
        R: Record,
        F: Fn(&R) -> bool,
    {
        Ok(self.scan::<R>(txn)?.into_iter().find(|row| predicate(row)))
    }

    fn find_count_where<R, F>(&self, txn: &Transaction, predicate: F) -> StoreResult<usize>
    where
        R: Record,
        F: Fn(&R) -> bool,
    {
        Ok(self.scan::<R>(txn)?.iter().filter(|row| predicate(row)).count())
    }

    fn create<R: Record>(&self, txn: &mut Transaction, fields: R::Fields) -> StoreResult<R> {
        txn.ensure_active()?;
        let id = self.tables.write().allocate(R::TABLE);
        let row = R::from_fields(R::Id::from_raw(id), fields);
        self.stage(txn, &row)?;
        Ok(row)
    }

    fn update<R: Record>(
        &self,
        txn: &mut Transaction,
        id: R::Id,
        changes: R::Changes,
    ) -> StoreResult<bool> {
        txn.ensure_active()?;
        let mut row: R = match txn.get_pending_write(R::TABLE, id.raw()) {
            Some(PendingWrite::Put { payload, .. }) => Some(codec::decode(payload)?),
            Some(PendingWrite::Delete) => None,
            None => self
                .claim(txn, (R::TABLE, id.raw()))?
                .map(|payload| codec::decode(&payload))
                .transpose()?,
        }
        .ok_or_else(|| StoreError::not_found(R::TABLE, id.raw()))?;
        if !row.apply(changes) {
            return Ok(false);
        }
        self.stage(txn, &row)?;
        Ok(true)
    }

    fn delete<R: Record>(&self, txn: &mut Transaction, id: R::Id) -> StoreResult<bool> {
        txn.ensure_active()?;
        let exists = match txn.get_pending_write(R::TABLE, id.raw()) {
            Some(PendingWrite::Put { .. }) => true,
            Some(PendingWrite::Delete) => false,
            None => self.claim(txn, (R::TABLE, id.raw()))?.is_some(),
        };
        if !exists {
            return Ok(false);
        }
        txn.delete(R::TABLE, id.raw())?;
        Ok(true)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("persistent", &self.snapshot.is_some())
            .field("committed_seq", &self.committed_seq())
            .field("active_txns", &self.active_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewNode, NewSubuser, NewUser, Node, NodeChanges, Subuser, User};
    use crate::types::{NodeId, ServerId, UserId};
    use tempfile::TempDir;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.into(),
            username: username.into(),
            name_first: "Test".into(),
            name_last: "User".into(),
            root_admin: false,
        }
    }

    fn new_node(secret: &str) -> NewNode {
        NewNode {
            name: "node".into(),
            description: None,
            fqdn: "node.example.com".into(),
            scheme: "https".into(),
            behind_proxy: false,
            daemon_listen: 8080,
            daemon_sftp: 2022,
            daemon_base: "/srv/daemon-data".into(),
            upload_size: 100,
            daemon_secret: secret.into(),
        }
    }

    #[test]
    fn uncommitted_rows_are_private_to_the_transaction() {
        let db = Database::open_in_memory();
        let mut txn = db.begin().unwrap();
        let user: User = db.create(&mut txn, new_user("a@x.io", "alpha")).unwrap();

        assert_eq!(db.find::<User>(&txn, user.id).unwrap(), Some(user.clone()));
        assert_eq!(db.get::<User>(user.id).unwrap(), None);

        db.commit(&mut txn).unwrap();
        assert_eq!(db.get::<User>(user.id).unwrap(), Some(user));
        assert_eq!(db.committed_seq().as_u64(), 1);
        assert_eq!(db.active_count(), 0);
    }

    #[test]
    fn rollback_discards_rows_but_not_ids() {
        let db = Database::open_in_memory();
        let mut txn = db.begin().unwrap();
        let first: User = db.create(&mut txn, new_user("a@x.io", "alpha")).unwrap();
        db.rollback(&mut txn).unwrap();

        assert_eq!(db.count::<User>(), 0);
        assert_eq!(db.active_count(), 0);

        let second: User = db
            .transaction(|txn| db.create(txn, new_user("a@x.io", "alpha")))
            .unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn find_where_overlays_pending_writes() {
        let db = Database::open_in_memory();
        db.transaction(|txn| db.create::<User>(txn, new_user("a@x.io", "alpha")))
            .unwrap();

        let mut txn = db.begin().unwrap();
        db.create::<User>(&mut txn, new_user("b@x.io", "bravo")).unwrap();

        let count = db
            .find_count_where::<User, _>(&txn, |u| u.email.ends_with("@x.io"))
            .unwrap();
        assert_eq!(count, 2);

        let found = db
            .find_first_where::<User, _>(&txn, |u| u.username == "bravo")
            .unwrap();
        assert!(found.is_some());
        db.rollback(&mut txn).unwrap();
    }

    #[test]
    fn unique_key_reserved_across_transactions() {
        let db = Database::open_in_memory();
        let mut t1 = db.begin().unwrap();
        let mut t2 = db.begin().unwrap();

        db.create::<User>(&mut t1, new_user("a@x.io", "alpha")).unwrap();
        let err = db
            .create::<User>(&mut t2, new_user("A@X.io", "other"))
            .unwrap_err();
        assert_eq!(err.violated_constraint(), Some(User::EMAIL_UNIQUE));

        db.rollback(&mut t1).unwrap();
        assert_eq!(db.reservation_count(), 0);
        db.create::<User>(&mut t2, new_user("A@X.io", "other")).unwrap();
        db.commit(&mut t2).unwrap();
    }

    #[test]
    fn update_reports_noop_changesets() {
        let db = Database::open_in_memory();
        let node: Node = db
            .transaction(|txn| db.create(txn, new_node("s1")))
            .unwrap();

        let mut txn = db.begin().unwrap();
        let changed = db
            .update::<Node>(&mut txn, node.id, NodeChanges::default())
            .unwrap();
        assert!(!changed);

        let changed = db
            .update::<Node>(
                &mut txn,
                node.id,
                NodeChanges {
                    daemon_secret: Some("s2".into()),
                    ..NodeChanges::default()
                },
            )
            .unwrap();
        assert!(changed);
        db.commit(&mut txn).unwrap();

        // The old secret is free again once the rotation committed.
        db.transaction(|txn| db.create::<Node>(txn, new_node("s1")))
            .unwrap();
    }

    #[test]
    fn update_missing_row_is_not_found() {
        let db = Database::open_in_memory();
        let mut txn = db.begin().unwrap();
        let err = db
            .update::<Node>(&mut txn, NodeId::new(99), NodeChanges::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound { .. }));
        db.rollback(&mut txn).unwrap();
    }

    #[test]
    fn delete_hides_row_inside_transaction() {
        let db = Database::open_in_memory();
        let user: User = db
            .transaction(|txn| db.create(txn, new_user("a@x.io", "alpha")))
            .unwrap();

        let mut txn = db.begin().unwrap();
        assert!(db.delete::<User>(&mut txn, user.id).unwrap());
        assert!(db.find::<User>(&txn, user.id).unwrap().is_none());
        assert!(!db.delete::<User>(&mut txn, UserId::new(42)).unwrap());
        db.commit(&mut txn).unwrap();

        assert_eq!(db.count::<User>(), 0);
    }

    #[test]
    fn second_writer_of_a_row_conflicts_until_first_finishes() {
        let db = Database::open_in_memory();
        let node: Node = db
            .transaction(|txn| db.create(txn, new_node("s1")))
            .unwrap();

        let mut updater = db.begin().unwrap();
        let mut deleter = db.begin().unwrap();
        let changed = db
            .update::<Node>(
                &mut updater,
                node.id,
                NodeChanges {
                    name: Some("renamed".into()),
                    ..NodeChanges::default()
                },
            )
            .unwrap();
        assert!(changed);

        let err = db.delete::<Node>(&mut deleter, node.id).unwrap_err();
        assert!(matches!(err, StoreError::TransactionConflict { .. }));
        let err = db
            .update::<Node>(&mut deleter, node.id, NodeChanges::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::TransactionConflict { .. }));
        db.rollback(&mut deleter).unwrap();

        db.commit(&mut updater).unwrap();
        assert_eq!(db.get::<Node>(node.id).unwrap().unwrap().name, "renamed");
        assert_eq!(db.reservation_count(), 0);

        let mut later = db.begin().unwrap();
        assert!(db.delete::<Node>(&mut later, node.id).unwrap());
        db.commit(&mut later).unwrap();
        assert!(db.get::<Node>(node.id).unwrap().is_none());
    }

    #[test]
    fn update_after_committed_delete_does_not_resurrect_row() {
        let db = Database::open_in_memory();
        let node: Node = db
            .transaction(|txn| db.create(txn, new_node("s1")))
            .unwrap();

        let mut updater = db.begin().unwrap();
        assert!(db.find::<Node>(&updater, node.id).unwrap().is_some());

        db.transaction(|txn| db.delete::<Node>(txn, node.id))
            .unwrap();

        let err = db
            .update::<Node>(
                &mut updater,
                node.id,
                NodeChanges {
                    name: Some("renamed".into()),
                    ..NodeChanges::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound { .. }));
        db.commit(&mut updater).unwrap();
        assert!(db.get::<Node>(node.id).unwrap().is_none());
    }

    #[test]
    fn one_transaction_cannot_stage_two_grants_for_a_pair() {
        let db = Database::open_in_memory();
        let grant = |secret: &str| NewSubuser {
            user_id: UserId::new(1),
            server_id: ServerId::new(1),
            daemon_secret: secret.into(),
            permissions: vec!["file.read".into()],
        };

        let mut txn = db.begin().unwrap();
        db.create::<Subuser>(&mut txn, grant("first-secret")).unwrap();
        let err = db
            .create::<Subuser>(&mut txn, grant("second-secret"))
            .unwrap_err();
        assert_eq!(err.violated_constraint(), Some(Subuser::PAIR_UNIQUE));
        db.commit(&mut txn).unwrap();

        assert_eq!(db.count::<Subuser>(), 1);
    }

    #[test]
    fn finished_transaction_cannot_be_reused() {
        let db = Database::open_in_memory();
        let mut txn = db.begin().unwrap();
        db.commit(&mut txn).unwrap();

        assert!(db.commit(&mut txn).is_err());
        assert!(db.rollback(&mut txn).is_err());
    }

    #[test]
    fn invalid_rows_are_rejected_before_staging() {
        let db = Database::open_in_memory();
        let mut txn = db.begin().unwrap();
        let err = db
            .create::<User>(&mut txn, new_user("not-an-email", "alpha"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert_eq!(txn.write_count(), 0);
        db.rollback(&mut txn).unwrap();
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel.db");
        let user_id = {
            let db = Database::open(&path, Config::new().sync_on_commit(false)).unwrap();
            let user: User = db
                .transaction(|txn| db.create(txn, new_user("a@x.io", "alpha")))
                .unwrap();
            user.id
        };

        let db = Database::open(&path, Config::new()).unwrap();
        assert_eq!(db.committed_seq().as_u64(), 1);
        assert!(db.get::<User>(user_id).unwrap().is_some());

        // Unique index is rebuilt from the snapshot.
        let mut txn = db.begin().unwrap();
        assert!(db
            .create::<User>(&mut txn, new_user("a@x.io", "bravo"))
            .is_err());
        // Row counters too.
        let next: User = db
            .create(&mut txn, new_user("b@x.io", "bravo"))
            .unwrap();
        assert!(next.id > user_id);
        db.rollback(&mut txn).unwrap();
    }

    mod props {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashSet;

        proptest! {
            #[test]
            fn committed_emails_stay_unique(
                ops in proptest::collection::vec((0u8..4, any::<bool>()), 1..24)
            ) {
                let db = Database::open_in_memory();
                let mut open: Vec<Transaction> = Vec::new();
                for (i, (mailbox, commit)) in ops.into_iter().enumerate() {
                    let mut txn = db.begin().unwrap();
                    let fields = new_user(&format!("m{mailbox}@x.io"), &format!("user{i}"));
                    if db.create::<User>(&mut txn, fields).is_err() {
                        db.rollback(&mut txn).unwrap();
                        continue;
                    }
                    if commit {
                        db.commit(&mut txn).unwrap();
                    } else {
                        open.push(txn);
                    }
                }
                for mut txn in open {
                    let _ = db.commit(&mut txn);
                }

                let users = db.list::<User>().unwrap();
                let emails: HashSet<_> = users.iter().map(|u| u.email.clone()).collect();
                prop_assert_eq!(emails.len(), users.len());
                prop_assert_eq!(db.active_count(), 0);
                prop_assert_eq!(db.reservation_count(), 0);
            }
        }
    }
}
