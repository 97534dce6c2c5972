//! # Panelsync Core
//!
//! Services that change local panel state and mirror it to daemons.
//!
//! This crate provides:
//! - The sync coordinator: local transaction, daemon call, then commit or rollback
//! - Find-or-create provisioning of users by email
//! - Subuser creation, update and deletion
//! - Node updates with optional daemon secret rotation
//! - Panel configuration, token generation and failure diagnostics
//!
//! ## Key Invariants
//!
//! - The daemon is only called after the local write succeeded
//! - Commit is the last step; a daemon failure always rolls back
//! - No transaction is left open on any error path
//! - Users created by provisioning are committed independently and persist
//! - Daemon failures, and only those, are reported to the [`DiagnosticSink`]
//!
//! ## Example
//!
//! ```no_run
//! use panelsync_core::{PanelConfig, ServiceContext, SubuserCreationService};
//! use panelsync_daemon::{PermissionSet, ReqwestClient};
//! use panelsync_store::{Database, ServerId};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PanelConfig::new().with_panel_url("https://panel.example.com");
//! let http = ReqwestClient::new(&config.daemon)?;
//! let store = Arc::new(Database::open_in_memory());
//! let ctx = Arc::new(ServiceContext::new(store, http, config));
//!
//! let subuser = SubuserCreationService::new(ctx).handle(
//!     ServerId::new(1),
//!     "friend@example.com",
//!     &PermissionSet::new(["power.start", "command.send"]),
//! )?;
//! println!("granted {}", subuser.id);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod coordinator;
mod diagnostics;
mod error;
mod node;
mod provision;
mod random;
mod resolve;
mod subuser;

pub use config::{ConfigError, PanelConfig, UsernameConfig};
pub use context::ServiceContext;
pub use coordinator::{SyncCoordinator, SyncState};
pub use diagnostics::{DiagnosticSink, TracingSink};
pub use error::{ServiceError, ServiceResult};
pub use node::{NodeChangeset, NodeUpdateService};
pub use provision::{
    find_user_by_email, UserProvisioner, PLACEHOLDER_FIRST_NAME, PLACEHOLDER_LAST_NAME,
};
pub use random::{ThreadRngTokens, TokenGenerator};
pub use resolve::{NodeRef, ServerRef};
pub use subuser::{SubuserCreationService, SubuserDeletionService, SubuserUpdateService};
