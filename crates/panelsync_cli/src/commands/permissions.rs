//! Permission catalog command.

use super::CliError;
use panelsync_daemon::permissions::{BASE_DAEMON_PERMISSIONS, CATALOG};
use serde::Serialize;

/// One catalog row.
#[derive(Serialize)]
struct CatalogRow {
    name: &'static str,
    daemon: Option<&'static str>,
    description: &'static str,
}

/// Prints every permission the panel accepts.
pub fn run(format: &str) -> Result<(), CliError> {
    let rows: Vec<CatalogRow> = CATALOG
        .iter()
        .map(|e| CatalogRow {
            name: e.name,
            daemon: e.daemon,
            description: e.description,
        })
        .collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            println!("Always granted: {}", BASE_DAEMON_PERMISSIONS.join(", "));
            println!();
            println!("{:<28} {:<28} DESCRIPTION", "PERMISSION", "DAEMON");
            for row in &rows {
                println!(
                    "{:<28} {:<28} {}",
                    row.name,
                    row.daemon.unwrap_or("-"),
                    row.description
                );
            }
        }
    }
    Ok(())
}
