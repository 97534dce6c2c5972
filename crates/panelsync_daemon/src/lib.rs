//! # Panelsync Daemon
//!
//! Client side of the daemon API.
//!
//! This crate provides:
//! - The permission catalog and encoder ([`encode`])
//! - Request bodies for subuser keys and node configuration
//! - An address-then-act client ([`DaemonClient`]) over a pluggable [`HttpClient`]
//! - A blocking `reqwest` transport
//!
//! ## Failure codes
//!
//! Every failed call is a [`DaemonError`]. Its [`DaemonCode`] is either the
//! `E_CONN_REFUSED` sentinel (no response) or the HTTP status the daemon
//! answered with.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod messages;
pub mod permissions;
mod reqwest_client;
mod transport;

pub use client::{DaemonClient, NodeScope, ServerScope, ACCESS_SERVER_HEADER, ACCESS_TOKEN_HEADER};
pub use config::DaemonConfig;
pub use error::{ConnectionKind, DaemonCode, DaemonError, DaemonResult};
pub use messages::{
    NodeConfiguration, RemoteConfig, SftpConfig, SslConfig, SubuserKeyUpdate, UploadConfig,
    WebConfig,
};
pub use permissions::{encode, PermissionError, PermissionSet, SyncedPermissionSet};
pub use reqwest_client::ReqwestClient;
pub use transport::{HttpClient, HttpRequest, HttpResponse, Method};
