//! CLI command definitions

use clap::{Args, Parser, Subcommand};
use dispenser::config::DEFAULT_BOOTSTRAP_MEMBER;
use dispenser::Mode;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dispenser")]
#[command(about = "Chat bot that hands out RPC URLs to authorized members", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Maximum pooled database connections
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 8, global = true)]
    pub max_connections: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot
    Serve(ServeArgs),

    /// Initialize the database schema and the bootstrap member
    Init {
        /// Handle seeded into the membership list
        #[arg(long, env = "DISPENSER_BOOTSTRAP_MEMBER", default_value = DEFAULT_BOOTSTRAP_MEMBER)]
        bootstrap_member: String,
    },

    /// Add RPC URLs to the pool, one per line ('#' starts a comment)
    ///
    /// Examples:
    ///   dispenser seed urls.txt
    Seed {
        /// File with one URL per line
        file: PathBuf,
    },

    /// Manage members
    #[command(subcommand)]
    Member(MemberCommands),

    /// Show pool and membership statistics
    Status,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// Bot variant
    #[arg(long, value_enum, env = "DISPENSER_MODE", default_value_t = Mode::Admin)]
    pub mode: Mode,

    /// Handle seeded into the membership list on startup
    #[arg(long, env = "DISPENSER_BOOTSTRAP_MEMBER", default_value = DEFAULT_BOOTSTRAP_MEMBER)]
    pub bootstrap_member: String,

    /// Long-poll timeout in seconds
    #[arg(long, env = "DISPENSER_POLL_TIMEOUT", default_value_t = 30)]
    pub poll_timeout: u64,

    /// Address for the /health and /stats endpoint
    #[arg(long, env = "DISPENSER_HEALTH_BIND")]
    pub health_bind: Option<SocketAddr>,

    /// Keep state in memory instead of Postgres (local trials only)
    #[arg(long)]
    pub memory: bool,

    /// Seed the in-memory pool from this file (with --memory)
    #[arg(long, requires = "memory")]
    pub seed: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum MemberCommands {
    /// Add a member
    Add {
        /// Telegram handle (with or without '@')
        handle: String,
    },

    /// List all members
    List,
}
