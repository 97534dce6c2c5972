//! # Panelsync Testkit
//!
//! Test utilities for panelsync.
//!
//! This crate provides:
//! - [`TestPanel`]: a database, mock daemon, deterministic tokens and a
//!   recording diagnostic sink wired into one service context
//! - [`MockDaemon`]: an [`HttpClient`](panelsync_daemon::HttpClient) that
//!   records requests and replays scripted replies
//! - Deterministic token generators
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use panelsync_testkit::prelude::*;
//!
//! #[test]
//! fn grant_is_pushed() {
//!     let panel = TestPanel::new();
//!     let owner = panel.seed_user("owner@example.com", "owner");
//!     let node = panel.seed_node("eu-1");
//!     let server = panel.seed_server(&owner, &node);
//!
//!     panel.subuser_creation()
//!         .handle(&server, "friend@example.com", &PermissionSet::new(["power.start"]))
//!         .unwrap();
//!     assert_eq!(panel.daemon.request_count(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod daemon;
pub mod fixtures;
pub mod generators;
pub mod sink;
pub mod tokens;

pub use daemon::{MockDaemon, Reply};
pub use fixtures::{TestContext, TestPanel};
pub use sink::{Diagnostic, RecordingSink};
pub use tokens::{FixedTokens, SequenceTokens};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::daemon::{MockDaemon, Reply};
    pub use crate::fixtures::{TestContext, TestPanel};
    pub use crate::generators::*;
    pub use crate::sink::{Diagnostic, RecordingSink};
    pub use crate::tokens::{FixedTokens, SequenceTokens};
    pub use panelsync_core::{NodeChangeset, ServiceError};
    pub use panelsync_daemon::{DaemonCode, PermissionSet};
    pub use panelsync_store::Store;
}
