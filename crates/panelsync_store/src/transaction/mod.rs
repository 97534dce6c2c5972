//! Transactions over the record store.
//!
//! A transaction buffers its writes until commit. Reads made through it see
//! committed rows overlaid with its own pending writes. Rolling back simply
//! discards the buffer and releases any unique keys the transaction reserved.

mod state;

pub use state::{PendingWrite, Transaction, TransactionState};
