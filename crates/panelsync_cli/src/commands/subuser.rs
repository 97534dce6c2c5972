//! Subuser commands.

use super::{App, CliError};
use panelsync_core::{SubuserCreationService, SubuserDeletionService, SubuserUpdateService};
use panelsync_daemon::PermissionSet;
use panelsync_store::{ServerId, Subuser, SubuserId};
use serde::Serialize;

/// Subuser as shown to the operator.
#[derive(Serialize)]
struct SubuserView {
    id: u64,
    user: u64,
    server: u64,
    permissions: Vec<String>,
}

impl From<&Subuser> for SubuserView {
    fn from(subuser: &Subuser) -> Self {
        Self {
            id: subuser.id.as_u64(),
            user: subuser.user_id.as_u64(),
            server: subuser.server_id.as_u64(),
            permissions: subuser.permissions.clone(),
        }
    }
}

/// Result of `subuser remove`.
#[derive(Serialize)]
struct RemoveResult {
    /// Subuser id.
    id: u64,
    /// Whether a grant was removed.
    removed: bool,
}

fn print_subuser(view: &SubuserView) {
    println!(
        "Subuser {} (user {} on server {}): {}",
        view.id,
        view.user,
        view.server,
        view.permissions.join(", ")
    );
}

/// Grants the user with `email` access to `server`.
pub fn add(app: &App, server: u64, email: &str, permissions: &[String]) -> Result<(), CliError> {
    let permissions = PermissionSet::new(permissions.iter().cloned());
    let subuser =
        SubuserCreationService::new(app.ctx()).handle(ServerId::new(server), email, &permissions)?;
    app.emit(&SubuserView::from(&subuser), print_subuser)
}

/// Replaces the permissions of subuser `id`.
pub fn update(app: &App, id: u64, permissions: &[String]) -> Result<(), CliError> {
    let permissions = PermissionSet::new(permissions.iter().cloned());
    let subuser = SubuserUpdateService::new(app.ctx()).handle(SubuserId::new(id), &permissions)?;
    app.emit(&SubuserView::from(&subuser), print_subuser)
}

/// Revokes subuser `id`.
pub fn remove(app: &App, id: u64) -> Result<(), CliError> {
    let removed = SubuserDeletionService::new(app.ctx()).handle(SubuserId::new(id))?;
    app.emit(&RemoveResult { id, removed }, |result| {
        if result.removed {
            println!("Removed subuser {}", result.id);
        } else {
            println!("Subuser {} does not exist", result.id);
        }
    })
}

/// Lists subusers, optionally limited to one server.
pub fn list(app: &App, server: Option<u64>) -> Result<(), CliError> {
    let subusers: Vec<SubuserView> = app
        .db()
        .list::<Subuser>()?
        .iter()
        .filter(|s| server.map_or(true, |id| s.server_id.as_u64() == id))
        .map(SubuserView::from)
        .collect();
    app.emit(&subusers, |subusers| {
        for view in subusers {
            print_subuser(view);
        }
    })
}
