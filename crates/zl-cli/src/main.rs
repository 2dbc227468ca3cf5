//! Zelland CLI
//!
//! Manages remote terminal sessions served by Zellij's web client:
//! - Session bookkeeping (add, list, remove)
//! - Connect flows over SSH or against an already running server
//! - A control-channel monitor for the companion daemon

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zelland::commands::{self, AddArgs, Credentials};
use zelland::context::AppContext;
use zl_core::config::ConnectMode;

#[derive(Parser)]
#[command(name = "zelland")]
#[command(author, version, about = "Remote terminal session manager")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Probe a server that is already running
    Direct,
    /// Log in over SSH and start the server if needed
    Bootstrap,
}

impl From<Mode> for ConnectMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Direct => ConnectMode::Direct,
            Mode::Bootstrap => ConnectMode::Bootstrap,
        }
    }
}

#[derive(clap::Args)]
struct CredentialArgs {
    /// SSH password (not stored unless the session was added with --save-secret)
    #[arg(long, env = "ZELLAND_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Private key passphrase
    #[arg(long, env = "ZELLAND_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,
}

impl From<CredentialArgs> for Credentials {
    fn from(args: CredentialArgs) -> Self {
        Credentials {
            password: args.password,
            passphrase: args.passphrase,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add a remote session
    Add {
        /// Remote host name or address
        host: String,
        /// Display name (defaults to the host)
        #[arg(short, long)]
        name: Option<String>,
        /// SSH port
        #[arg(short, long)]
        port: Option<u16>,
        /// SSH username (defaults to the local user)
        #[arg(short, long)]
        user: Option<String>,
        /// SSH password
        #[arg(long, conflicts_with = "key")]
        password: Option<String>,
        /// Private key file
        #[arg(short, long)]
        key: Option<PathBuf>,
        /// Private key passphrase
        #[arg(long, requires = "key")]
        passphrase: Option<String>,
        /// Remote Zellij session name (generated when omitted)
        #[arg(short, long)]
        session: Option<String>,
        /// How to reach the web server
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,
        /// Store the password or passphrase in the session file
        #[arg(long)]
        save_secret: bool,
        /// Companion daemon port
        #[arg(long)]
        daemon_port: Option<u16>,
        /// Companion daemon pre-shared key
        #[arg(long)]
        psk: Option<String>,
    },

    /// List configured sessions
    #[command(alias = "ls")]
    List {
        /// Show mode, last connect time and URL
        #[arg(short, long)]
        long: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Test a session's connection without changing it
    Test {
        /// Session id, id prefix, name or remote session
        session: String,
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Connect a session and print its URL
    Connect {
        /// Session id, id prefix, name or remote session
        session: String,
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Disconnect a session, leaving the remote server running
    Disconnect {
        /// Session id, id prefix, name or remote session
        session: String,
    },

    /// Stop the remote server and disconnect
    Kill {
        /// Session id, id prefix, name or remote session
        session: String,
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Disconnect and delete a session
    #[command(alias = "rm")]
    Remove {
        /// Session id, id prefix, name or remote session
        session: String,
    },

    /// Print control-channel messages from a companion daemon
    Watch {
        /// Daemon host
        host: String,
        /// Daemon port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Pre-shared key
        #[arg(long, env = "ZELLAND_PSK", hide_env_values = true)]
        psk: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show config and session file paths
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let ctx = AppContext::load(cli.config)?;

    match cli.command {
        Commands::Add {
            host,
            name,
            port,
            user,
            password,
            key,
            passphrase,
            session,
            mode,
            save_secret,
            daemon_port,
            psk,
        } => {
            let args = AddArgs {
                host,
                name,
                port,
                user,
                password,
                key,
                passphrase,
                session,
                mode: mode.map(Into::into),
                save_secret,
                daemon_port,
                psk,
            };
            commands::add_command(&ctx.orchestrator()?, &args).await
        }
        Commands::List { long, json } => {
            commands::list_command(&ctx.orchestrator()?, long, json).await
        }
        Commands::Test {
            session,
            credentials,
        } => commands::test_command(&ctx.orchestrator()?, &session, &credentials.into()).await,
        Commands::Connect {
            session,
            credentials,
        } => {
            commands::connect_command(&ctx.orchestrator()?, &session, &credentials.into()).await
        }
        Commands::Disconnect { session } => {
            commands::disconnect_command(&ctx.orchestrator()?, &session).await
        }
        Commands::Kill {
            session,
            credentials,
        } => commands::kill_command(&ctx.orchestrator()?, &session, &credentials.into()).await,
        Commands::Remove { session } => {
            commands::remove_command(&ctx.orchestrator()?, &session).await
        }
        Commands::Watch { host, port, psk } => {
            commands::watch_command(&ctx.config.control, &host, port, psk).await
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(&ctx),
            ConfigAction::Path => commands::config_path(&ctx),
        },
    }
}
