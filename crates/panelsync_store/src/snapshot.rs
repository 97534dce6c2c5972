//! On-disk snapshot of committed state.
//!
//! The whole committed state is rewritten on every commit: encoded to a
//! sibling `.tmp` file, optionally fsynced, then renamed over the snapshot.
//! A `.lock` file held with an exclusive advisory lock keeps a second
//! process from opening the same snapshot.

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::record::UniqueKey;
use crate::types::Table;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Snapshot format version.
pub const SNAPSHOT_FORMAT: u16 = 1;

/// Serialized committed state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub format: u16,
    pub committed_seq: u64,
    pub next_ids: Vec<(Table, u64)>,
    pub rows: Vec<SnapshotRow>,
}

/// One committed row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SnapshotRow {
    pub table: Table,
    pub id: u64,
    pub payload: Vec<u8>,
    pub keys: Vec<UniqueKey>,
}

/// A locked snapshot location.
#[derive(Debug)]
pub(crate) struct SnapshotFile {
    path: PathBuf,
    sync: bool,
    _lock: File,
}

impl SnapshotFile {
    /// Locks the snapshot location and loads the existing snapshot, if any.
    pub(crate) fn open(
        path: &Path,
        create_if_missing: bool,
        sync: bool,
    ) -> StoreResult<(Self, Option<Snapshot>)> {
        if !path.exists() && !create_if_missing {
            return Err(StoreError::invalid_operation(format!(
                "snapshot {} does not exist",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(sibling(path, "lock"))?;
        lock.try_lock_exclusive().map_err(|e| {
            if e.kind() == ErrorKind::WouldBlock {
                StoreError::DatabaseLocked
            } else {
                StoreError::Io(e)
            }
        })?;

        let existing = if path.exists() {
            let bytes = fs::read(path)?;
            let snapshot: Snapshot = codec::decode(&bytes)?;
            if snapshot.format != SNAPSHOT_FORMAT {
                return Err(StoreError::invalid_format(format!(
                    "unsupported snapshot format {}",
                    snapshot.format
                )));
            }
            Some(snapshot)
        } else {
            None
        };

        Ok((
            Self {
                path: path.to_path_buf(),
                sync,
                _lock: lock,
            },
            existing,
        ))
    }

    /// Atomically replaces the snapshot.
    pub(crate) fn write(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let bytes = codec::encode(snapshot)?;
        let tmp = sibling(&self.path, "tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            if self.sync {
                file.sync_all()?;
            }
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Returns the snapshot path.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
