//! # Panelsync Store
//!
//! Transactional record store for the panelsync management backend.
//!
//! This crate provides:
//! - Typed records for users, nodes, servers and subusers
//! - Transactions with read-your-writes visibility
//! - Unique indexes that reserve keys at write time
//! - Optional snapshot persistence guarded by a file lock
//!
//! ## Visibility
//!
//! Writes staged in a [`Transaction`] are visible to that transaction's
//! `find*` reads and to nobody else until [`Store::commit`]. Committed reads
//! ([`Store::get`]) never observe uncommitted state.
//!
//! ## Uniqueness
//!
//! Unique keys are reserved as soon as a transaction writes them. A second
//! transaction writing the same key fails immediately with
//! [`StoreError::UniqueViolation`], so two concurrent grants for the same
//! user/server pair cannot both commit.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod database;
mod error;
mod index;
pub mod model;
mod record;
mod snapshot;
mod store;
mod transaction;
mod types;

pub use config::Config;
pub use database::Database;
pub use error::{StoreError, StoreResult};
pub use model::{
    NewNode, NewServer, NewSubuser, NewUser, Node, NodeChanges, Server, ServerChanges, Subuser,
    SubuserChanges, User, UserChanges,
};
pub use record::{Record, UniqueKey};
pub use snapshot::SNAPSHOT_FORMAT;
pub use store::Store;
pub use transaction::{PendingWrite, Transaction, TransactionState};
pub use types::{
    NodeId, RowKey, SequenceNumber, ServerId, SubuserId, Table, TransactionId, UserId,
};
