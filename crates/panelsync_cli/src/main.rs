//! Panelsync CLI
//!
//! Administers a panelsync snapshot and pushes changes to daemons.
//!
//! # Commands
//!
//! - `user` - Create and list users
//! - `node` - Register, update and list nodes
//! - `server` - Create and list servers
//! - `subuser` - Grant, change and revoke subuser access
//! - `permissions` - Print the permission catalog

mod commands;

use clap::{Parser, Subcommand};
use commands::{App, CliError};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Panelsync admin tool.
#[derive(Parser)]
#[command(name = "panelsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the snapshot file
    #[arg(global = true, long, default_value = "panelsync.db")]
    db: PathBuf,

    /// Path to a JSON panel configuration
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),

    /// Manage nodes
    #[command(subcommand)]
    Node(NodeCommand),

    /// Manage servers
    #[command(subcommand)]
    Server(ServerCommand),

    /// Manage subusers
    #[command(subcommand)]
    Subuser(SubuserCommand),

    /// Print the permission catalog
    Permissions,

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a user
    Create {
        /// Email address
        #[arg(long)]
        email: String,
        /// Login name
        #[arg(long)]
        username: String,
        /// Given name
        #[arg(long)]
        first_name: String,
        /// Family name
        #[arg(long)]
        last_name: String,
        /// Grant administrative rights
        #[arg(long)]
        admin: bool,
    },
    /// List users
    List,
}

#[derive(Subcommand)]
enum NodeCommand {
    /// Register a node
    Create {
        /// Display name
        #[arg(long)]
        name: String,
        /// Hostname the daemon is reachable at
        #[arg(long)]
        fqdn: String,
        /// http or https
        #[arg(long, default_value = "https")]
        scheme: String,
        /// TLS is terminated by a proxy in front of the daemon
        #[arg(long)]
        behind_proxy: bool,
        /// Daemon API port
        #[arg(long, default_value = "8080")]
        listen: u16,
        /// SFTP port
        #[arg(long, default_value = "2022")]
        sftp: u16,
        /// Daemon data directory
        #[arg(long, default_value = "/srv/daemon-data")]
        base: String,
        /// Upload limit in megabytes
        #[arg(long, default_value = "100")]
        upload_size: u32,
    },
    /// Update a node and push its configuration
    Update {
        /// Node id
        id: u64,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Hostname
        #[arg(long)]
        fqdn: Option<String>,
        /// http or https
        #[arg(long)]
        scheme: Option<String>,
        /// TLS is terminated by a proxy
        #[arg(long)]
        behind_proxy: Option<bool>,
        /// Daemon API port
        #[arg(long)]
        listen: Option<u16>,
        /// SFTP port
        #[arg(long)]
        sftp: Option<u16>,
        /// Daemon data directory
        #[arg(long)]
        base: Option<String>,
        /// Upload limit in megabytes
        #[arg(long)]
        upload_size: Option<u32>,
        /// Generate a new daemon secret
        #[arg(long)]
        reset_secret: bool,
    },
    /// List nodes
    List,
}

#[derive(Subcommand)]
enum ServerCommand {
    /// Create a server record
    Create {
        /// Display name
        #[arg(long)]
        name: String,
        /// Owning user id
        #[arg(long)]
        owner: u64,
        /// Hosting node id
        #[arg(long)]
        node: u64,
    },
    /// List servers
    List,
}

#[derive(Subcommand)]
enum SubuserCommand {
    /// Grant a user access to a server
    Add {
        /// Server id
        #[arg(long)]
        server: u64,
        /// Email of the user; unknown emails are provisioned
        #[arg(long)]
        email: String,
        /// Permissions to grant
        #[arg(long = "permission", short = 'p', required = true)]
        permissions: Vec<String>,
    },
    /// Replace a subuser's permissions
    Update {
        /// Subuser id
        id: u64,
        /// New permissions
        #[arg(long = "permission", short = 'p', required = true)]
        permissions: Vec<String>,
    },
    /// Revoke a subuser's access
    Remove {
        /// Subuser id
        id: u64,
    },
    /// List subusers
    List {
        /// Only subusers of this server
        #[arg(long)]
        server: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let format = cli.format.clone();
    if let Err(err) = run(cli) {
        commands::report_error(&err, &format);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let format = cli.format.as_str();
    match cli.command {
        Commands::Permissions => return commands::permissions::run(format),
        Commands::Version => {
            println!("panelsync v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let app = App::open(&cli.db, cli.config.as_deref(), format)?;
    match cli.command {
        Commands::User(UserCommand::Create {
            email,
            username,
            first_name,
            last_name,
            admin,
        }) => commands::user::create(&app, email, username, first_name, last_name, admin),
        Commands::User(UserCommand::List) => commands::user::list(&app),
        Commands::Node(NodeCommand::Create {
            name,
            fqdn,
            scheme,
            behind_proxy,
            listen,
            sftp,
            base,
            upload_size,
        }) => commands::node::create(
            &app,
            commands::node::NodeSpec {
                name,
                fqdn,
                scheme,
                behind_proxy,
                listen,
                sftp,
                base,
                upload_size,
            },
        ),
        Commands::Node(NodeCommand::Update {
            id,
            name,
            fqdn,
            scheme,
            behind_proxy,
            listen,
            sftp,
            base,
            upload_size,
            reset_secret,
        }) => commands::node::update(
            &app,
            id,
            panelsync_core::NodeChangeset {
                name,
                description: None,
                fqdn,
                scheme,
                behind_proxy,
                daemon_listen: listen,
                daemon_sftp: sftp,
                daemon_base: base,
                upload_size,
                reset_secret,
            },
        ),
        Commands::Node(NodeCommand::List) => commands::node::list(&app),
        Commands::Server(ServerCommand::Create { name, owner, node }) => {
            commands::server::create(&app, name, owner, node)
        }
        Commands::Server(ServerCommand::List) => commands::server::list(&app),
        Commands::Subuser(SubuserCommand::Add {
            server,
            email,
            permissions,
        }) => commands::subuser::add(&app, server, &email, &permissions),
        Commands::Subuser(SubuserCommand::Update { id, permissions }) => {
            commands::subuser::update(&app, id, &permissions)
        }
        Commands::Subuser(SubuserCommand::Remove { id }) => commands::subuser::remove(&app, id),
        Commands::Subuser(SubuserCommand::List { server }) => commands::subuser::list(&app, server),
        Commands::Permissions | Commands::Version => Ok(()),
    }
}
