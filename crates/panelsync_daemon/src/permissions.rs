//! Permission encoding.
//!
//! Panel permissions are dotted identifiers such as `power.start`. Only a
//! subset has a daemon counterpart; the rest gate panel features and are
//! dropped from the wire form. Encoding is a pure function: it never touches
//! the network and fails before any daemon call is attempted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while encoding a permission set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// The token does not match the permission grammar.
    #[error("malformed permission {0:?}")]
    Malformed(String),

    /// The token is well formed but not in the catalog.
    #[error("unknown permission {0:?}")]
    Unknown(String),

    /// No permissions were given.
    #[error("permission set is empty")]
    Empty,
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionEntry {
    /// Panel permission name.
    pub name: &'static str,
    /// Daemon permission, if the daemon enforces this permission.
    pub daemon: Option<&'static str>,
    /// Human readable description.
    pub description: &'static str,
}

const fn entry(
    name: &'static str,
    daemon: Option<&'static str>,
    description: &'static str,
) -> PermissionEntry {
    PermissionEntry {
        name,
        daemon,
        description,
    }
}

/// Permissions every subuser key carries on the daemon.
pub const BASE_DAEMON_PERMISSIONS: [&str; 2] = ["s:get", "s:console"];

/// Every permission a subuser may be granted.
pub const CATALOG: &[PermissionEntry] = &[
    entry("power.start", Some("s:power:start"), "Start the server."),
    entry("power.stop", Some("s:power:stop"), "Stop the server."),
    entry("power.restart", Some("s:power:restart"), "Restart the server."),
    entry("power.kill", Some("s:power:kill"), "Kill the server process."),
    entry("command.send", Some("s:command"), "Send console commands."),
    entry("subuser.list", None, "List subusers of the server."),
    entry("subuser.view", None, "View a subuser's permissions."),
    entry("subuser.edit", None, "Change a subuser's permissions."),
    entry("subuser.create", None, "Add subusers."),
    entry("subuser.delete", None, "Remove subusers."),
    entry("allocation.view", None, "View the server's allocations."),
    entry("allocation.edit", None, "Change the default allocation."),
    entry("startup.view", None, "View startup variables."),
    entry("startup.edit", None, "Change startup variables."),
    entry("database.view", None, "View databases."),
    entry("database.reset-password", None, "Reset database passwords."),
    entry("database.create", None, "Create databases."),
    entry("database.delete", None, "Delete databases."),
    entry("sftp.view", None, "View SFTP credentials."),
    entry("sftp.reset-password", Some("s:set-password"), "Change the SFTP password."),
    entry("file.list", Some("s:files:get"), "List files."),
    entry("file.read", Some("s:files:read"), "Read file contents."),
    entry("file.write", Some("s:files:post"), "Save file contents."),
    entry("file.create", Some("s:files:create"), "Create files and folders."),
    entry("file.upload", Some("s:files:upload"), "Upload files."),
    entry("file.delete", Some("s:files:delete"), "Delete files."),
    entry("file.download", Some("s:files:download"), "Download files."),
    entry("file.move", Some("s:files:move"), "Move and rename files."),
    entry("file.copy", Some("s:files:copy"), "Copy files."),
    entry("file.compress", Some("s:files:compress"), "Create archives."),
    entry("file.decompress", Some("s:files:decompress"), "Extract archives."),
];

/// Looks up a catalog entry by panel name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static PermissionEntry> {
    CATALOG.iter().find(|e| e.name == name)
}

/// Checks the permission grammar: two or more dot-separated segments, each
/// `[a-z][a-z0-9-]*`.
#[must_use]
pub fn is_well_formed(token: &str) -> bool {
    let mut segments = 0;
    for segment in token.split('.') {
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return false,
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return false;
        }
        segments += 1;
    }
    segments >= 2
}

/// A caller-supplied set of panel permissions.
///
/// Tokens are trimmed and lower-cased; duplicates are dropped keeping the
/// first occurrence. Nothing is validated until [`encode`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(Vec<String>);

impl PermissionSet {
    /// Canonicalizes a list of permissions.
    pub fn new<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for raw in permissions {
            let token = raw.as_ref().trim().to_lowercase();
            if !out.contains(&token) {
                out.push(token);
            }
        }
        Self(out)
    }

    /// Returns the permissions in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns the number of permissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the set.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<S: AsRef<str>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// The wire form of a permission set, as sent to the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncedPermissionSet(Vec<String>);

impl SyncedPermissionSet {
    /// The empty set, which revokes a key on the daemon.
    #[must_use]
    pub fn revoked() -> Self {
        Self(Vec::new())
    }

    /// Returns true for the revocation set.
    #[must_use]
    pub fn is_revocation(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the daemon permissions in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Encodes a permission set into its wire form.
///
/// The base daemon permissions come first, followed by the daemon
/// permissions of the caller's set in caller order.
pub fn encode(permissions: &PermissionSet) -> Result<SyncedPermissionSet, PermissionError> {
    if permissions.is_empty() {
        return Err(PermissionError::Empty);
    }

    let mut wire: Vec<String> = BASE_DAEMON_PERMISSIONS.iter().map(|p| (*p).to_string()).collect();
    for token in permissions.as_slice() {
        if !is_well_formed(token) {
            return Err(PermissionError::Malformed(token.clone()));
        }
        let entry = lookup(token).ok_or_else(|| PermissionError::Unknown(token.clone()))?;
        if let Some(daemon) = entry.daemon {
            if !wire.iter().any(|p| p == daemon) {
                wire.push(daemon.to_string());
            }
        }
    }
    Ok(SyncedPermissionSet(wire))
}
