//! Test fixtures.
//!
//! [`TestPanel`] wires a database, a [`MockDaemon`], [`SequenceTokens`] and
//! a [`RecordingSink`] into one service context and offers seeding helpers.

use crate::daemon::MockDaemon;
use crate::sink::RecordingSink;
use crate::tokens::SequenceTokens;
use panelsync_core::{
    NodeUpdateService, PanelConfig, ServiceContext, SubuserCreationService,
    SubuserDeletionService, SubuserUpdateService,
};
use panelsync_store::{Config, Database, NewNode, NewServer, NewUser, Node, Server, Store, User};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Service context used by the fixtures.
pub type TestContext = ServiceContext<Database, Arc<MockDaemon>>;

/// A fully wired panel for tests.
pub struct TestPanel {
    /// The database.
    pub db: Arc<Database>,
    /// The daemon double shared by all nodes.
    pub daemon: Arc<MockDaemon>,
    /// Token generator used by the services.
    pub tokens: Arc<SequenceTokens>,
    /// Diagnostic sink used by the services.
    pub sink: Arc<RecordingSink>,
    /// The service context.
    pub ctx: Arc<TestContext>,
    _temp_dir: Option<TempDir>,
}

impl Default for TestPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPanel {
    /// Creates a panel over an in-memory database.
    pub fn new() -> Self {
        Self::with_config(PanelConfig::new().with_panel_url("https://panel.test"))
    }

    /// Creates a panel over an in-memory database with custom configuration.
    pub fn with_config(config: PanelConfig) -> Self {
        Self::build(Arc::new(Database::open_in_memory()), config, None)
    }

    /// Creates a panel over a snapshot file in a temporary directory.
    pub fn persistent() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(
            &temp_dir.path().join("panel.db"),
            Config::new().sync_on_commit(false),
        )
        .expect("Failed to open file database");
        Self::build(
            Arc::new(db),
            PanelConfig::new().with_panel_url("https://panel.test"),
            Some(temp_dir),
        )
    }

    fn build(db: Arc<Database>, config: PanelConfig, temp_dir: Option<TempDir>) -> Self {
        let daemon = Arc::new(MockDaemon::new());
        let tokens = Arc::new(SequenceTokens::new());
        let sink = Arc::new(RecordingSink::new());
        let ctx = ServiceContext::new(Arc::clone(&db), Arc::clone(&daemon), config)
            .with_tokens(tokens.clone())
            .with_diagnostics(sink.clone());

        Self {
            db,
            daemon,
            tokens,
            sink,
            ctx: Arc::new(ctx),
            _temp_dir: temp_dir,
        }
    }

    /// Returns the snapshot path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("panel.db"))
    }

    /// Inserts a committed user.
    pub fn seed_user(&self, email: &str, username: &str) -> User {
        self.db
            .transaction(|txn| {
                self.db.create(
                    txn,
                    NewUser {
                        email: email.to_string(),
                        username: username.to_string(),
                        name_first: "Test".to_string(),
                        name_last: "User".to_string(),
                        root_admin: false,
                    },
                )
            })
            .expect("Failed to seed user")
    }

    /// Inserts a committed node listening on `<name>.nodes.test:8080`.
    pub fn seed_node(&self, name: &str) -> Node {
        self.db
            .transaction(|txn| {
                self.db.create(
                    txn,
                    NewNode {
                        name: name.to_string(),
                        description: None,
                        fqdn: format!("{name}.nodes.test"),
                        scheme: "https".to_string(),
                        behind_proxy: false,
                        daemon_listen: 8080,
                        daemon_sftp: 2022,
                        daemon_base: "/srv/daemon-data".to_string(),
                        upload_size: 100,
                        daemon_secret: format!("{name}-secret"),
                    },
                )
            })
            .expect("Failed to seed node")
    }

    /// Inserts a committed server owned by `owner` on `node`.
    pub fn seed_server(&self, owner: &User, node: &Node) -> Server {
        self.db
            .transaction(|txn| {
                self.db.create(
                    txn,
                    NewServer {
                        name: format!("server-of-{}", owner.username),
                        owner_id: owner.id,
                        node_id: node.id,
                    },
                )
            })
            .expect("Failed to seed server")
    }

    /// Subuser creation over this panel.
    pub fn subuser_creation(&self) -> SubuserCreationService<Database, Arc<MockDaemon>> {
        SubuserCreationService::new(Arc::clone(&self.ctx))
    }

    /// Subuser update over this panel.
    pub fn subuser_update(&self) -> SubuserUpdateService<Database, Arc<MockDaemon>> {
        SubuserUpdateService::new(Arc::clone(&self.ctx))
    }

    /// Subuser deletion over this panel.
    pub fn subuser_deletion(&self) -> SubuserDeletionService<Database, Arc<MockDaemon>> {
        SubuserDeletionService::new(Arc::clone(&self.ctx))
    }

    /// Node update over this panel.
    pub fn node_update(&self) -> NodeUpdateService<Database, Arc<MockDaemon>> {
        NodeUpdateService::new(Arc::clone(&self.ctx))
    }
}
