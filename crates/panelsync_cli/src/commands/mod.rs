//! CLI command implementations.

pub mod node;
pub mod permissions;
pub mod server;
pub mod subuser;
pub mod user;

use panelsync_core::{ConfigError, PanelConfig, ServiceContext, ServiceError};
use panelsync_daemon::{DaemonError, PermissionError, ReqwestClient};
use panelsync_store::{Config, Database, StoreError};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Service context used by every command.
pub type CliContext = ServiceContext<Database, ReqwestClient>;

/// Errors surfaced to the operator.
#[derive(Debug, Error)]
pub enum CliError {
    /// A service operation failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The snapshot could not be opened or written.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The configuration file is unusable.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("daemon client error: {0}")]
    Daemon(#[from] DaemonError),

    /// A permission argument was rejected.
    #[error("invalid permissions: {0}")]
    Permission(#[from] PermissionError),

    /// Output could not be serialized.
    #[error("output error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Short machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Service(err) => err.kind(),
            Self::Store(_) => "store",
            Self::Config(_) => "config",
            Self::Daemon(_) => "daemon_client",
            Self::Permission(_) => "validation",
            Self::Json(_) => "output",
        }
    }

    fn code(&self) -> Option<String> {
        match self {
            Self::Service(err) => err.daemon_code().map(|code| code.to_string()),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorReport {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

/// Prints an error in the requested format.
pub fn report_error(err: &CliError, format: &str) {
    let report = ErrorReport {
        error: err.kind(),
        message: err.to_string(),
        code: err.code(),
    };
    match format {
        "json" => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error: {}", report.message),
        },
        _ => match report.code {
            Some(code) => eprintln!("Error [{code}]: {}", report.message),
            None => eprintln!("Error: {}", report.message),
        },
    }
}

/// Opened snapshot plus the services built on it.
pub struct App {
    db: Arc<Database>,
    ctx: Arc<CliContext>,
    format: String,
}

impl App {
    /// Opens the snapshot at `db_path` and wires the daemon client.
    pub fn open(db_path: &Path, config_path: Option<&Path>, format: &str) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => PanelConfig::from_file(path)?,
            None => PanelConfig::default(),
        };
        config.validate()?;

        let db = Arc::new(Database::open(db_path, Config::default())?);
        let http = ReqwestClient::new(&config.daemon)?;
        let ctx = Arc::new(ServiceContext::new(Arc::clone(&db), http, config));
        tracing::debug!(path = %db_path.display(), "opened panel");

        Ok(Self {
            db,
            ctx,
            format: format.to_string(),
        })
    }

    /// Returns the database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Returns the shared service context.
    pub fn ctx(&self) -> Arc<CliContext> {
        Arc::clone(&self.ctx)
    }

    /// Prints `value` as JSON, or runs `text` for the text format.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> Result<(), CliError> {
        match self.format.as_str() {
            "json" => println!("{}", serde_json::to_string_pretty(value)?),
            _ => text(value),
        }
        Ok(())
    }
}
