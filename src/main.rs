//! Dispenser CLI entry point

mod cli;

use crate::cli::{Cli, Commands, MemberCommands, ServeArgs};
use anyhow::{Context, Result};
use clap::Parser;
use dispenser::health::{self, HealthState};
use dispenser::identity::Handle;
use dispenser::storage::{
    AllocationStore, MemberAdded, MemberStore, MemoryStore, PostgresConfig, PostgresStore,
};
use dispenser::telegram::{Poller, TelegramClient};
use dispenser::{Allocator, BotConfig, CommandRouter};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let database_url = cli.database_url;
    let max_connections = cli.max_connections;
    let db_config = || get_db_config(database_url.clone(), max_connections);

    match cli.command {
        Commands::Serve(args) => serve(args, db_config).await,
        Commands::Init { bootstrap_member } => init(db_config()?, bootstrap_member).await,
        Commands::Seed { file } => seed(db_config()?, &file).await,
        Commands::Member(command) => member(db_config()?, command).await,
        Commands::Status => status(db_config()?).await,
    }
}

fn get_db_config(database_url: Option<String>, max_connections: usize) -> Result<PostgresConfig> {
    let url = database_url.context("DATABASE_URL is required for this operation")?;
    Ok(PostgresConfig::from_url(&url)
        .context("Invalid DATABASE_URL")?
        .max_connections(max_connections))
}

/// Read a provisioning file: one URL per line, blank lines and `#` comments skipped
fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL file: {}", path.display()))?;
    Ok(parse_url_list(&contents))
}

fn parse_url_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// The store the bot runs against
enum Backend {
    Postgres(Arc<PostgresStore>),
    Memory(Arc<MemoryStore>),
}

impl Backend {
    fn members(&self) -> Arc<dyn MemberStore> {
        match self {
            Backend::Postgres(store) => store.clone(),
            Backend::Memory(store) => store.clone(),
        }
    }

    fn allocations(&self) -> Arc<dyn AllocationStore> {
        match self {
            Backend::Postgres(store) => store.clone(),
            Backend::Memory(store) => store.clone(),
        }
    }

    fn close(&self) {
        match self {
            Backend::Postgres(store) => store.close(),
            Backend::Memory(store) => store.close(),
        }
    }
}

async fn ensure_bootstrap_member(members: &dyn MemberStore, handle: &Handle) -> Result<()> {
    match members.add_member(handle).await? {
        MemberAdded::Added => info!(member = %handle, "Bootstrap member added"),
        MemberAdded::AlreadyMember => info!(member = %handle, "Bootstrap member present"),
    }
    Ok(())
}

async fn serve<F>(args: ServeArgs, db_config: F) -> Result<()>
where
    F: FnOnce() -> Result<PostgresConfig>,
{
    let mut config = BotConfig::new(args.mode)
        .bootstrap_member(args.bootstrap_member)
        .poll_timeout(Duration::from_secs(args.poll_timeout));
    if let Some(addr) = args.health_bind {
        config = config.health_bind(addr);
    }
    let bootstrap = config
        .bootstrap_handle()
        .context("Invalid bootstrap member")?;

    let backend = if args.memory {
        let store = Arc::new(MemoryStore::open());
        if let Some(path) = &args.seed {
            let count = store.seed(read_url_file(path)?);
            info!(count, "Seeded in-memory URL pool");
        }
        Backend::Memory(store)
    } else {
        Backend::Postgres(Arc::new(PostgresStore::open(db_config()?).await?))
    };

    ensure_bootstrap_member(backend.members().as_ref(), &bootstrap).await?;

    let allocator = Allocator::new(backend.allocations());
    let router = Arc::new(CommandRouter::for_mode(
        config.mode,
        backend.members(),
        allocator,
    ));

    let client = Arc::new(TelegramClient::new(&args.bot_token, config.poll_timeout)?);
    let me = client
        .get_me()
        .await
        .context("Failed to reach Telegram (check TELEGRAM_BOT_TOKEN)")?;
    info!(bot = ?me.username, mode = %config.mode, "Connected to Telegram");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stopped = |mut rx: watch::Receiver<bool>| async move {
        let _ = rx.wait_for(|stop| *stop).await;
    };

    let health_task = config.health_bind.map(|addr| {
        let state = HealthState {
            store: backend.allocations(),
        };
        tokio::spawn(health::serve(addr, state, stopped(shutdown_rx.clone())))
    });

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping bot");
        let _ = shutdown_tx.send(true);
    });

    let poller = Poller::new(client, router, config).bot_username(me.username);
    let result = poller.run(stopped(shutdown_rx)).await;

    if let Some(task) = health_task {
        match task.await {
            Ok(Err(e)) => error!(error = %e, "Health endpoint failed"),
            Err(e) => error!(error = %e, "Health endpoint task panicked"),
            Ok(Ok(())) => {}
        }
    }

    backend.close();
    info!("Dispenser stopped");

    result.map_err(Into::into)
}

async fn init(db_config: PostgresConfig, bootstrap_member: String) -> Result<()> {
    let bootstrap = Handle::parse(&bootstrap_member).context("Invalid bootstrap member")?;

    let store = PostgresStore::open(db_config).await?;
    ensure_bootstrap_member(&store, &bootstrap).await?;
    store.close();

    println!("Database schema initialized successfully");
    Ok(())
}

async fn seed(db_config: PostgresConfig, file: &Path) -> Result<()> {
    let urls = read_url_file(file)?;
    if urls.is_empty() {
        println!("No URLs found in {}", file.display());
        return Ok(());
    }

    let store = PostgresStore::open(db_config).await?;
    let count = store.seed_urls(&urls).await?;
    store.close();

    println!("Added {} URLs to the pool", count);
    Ok(())
}

async fn member(db_config: PostgresConfig, command: MemberCommands) -> Result<()> {
    let store = PostgresStore::open(db_config).await?;

    match command {
        MemberCommands::Add { handle } => {
            let handle = Handle::parse(&handle).context("Invalid handle")?;
            match store.add_member(&handle).await? {
                MemberAdded::Added => println!("{} added to members", handle),
                MemberAdded::AlreadyMember => println!("{} is already a member", handle),
            }
        }

        MemberCommands::List => {
            let members = store.list_members().await?;
            if members.is_empty() {
                println!("(no members)");
            }
            for name in members {
                println!("{}", name);
            }
        }
    }

    store.close();
    Ok(())
}

async fn status(db_config: PostgresConfig) -> Result<()> {
    let store = PostgresStore::open(db_config).await?;
    let stats = store.pool_stats().await?;
    let members = store.member_count().await?;
    store.close();

    println!("Dispenser Status");
    println!("================");
    println!("Database:  Connected");
    println!("Members:   {}", members);
    println!("URLs:      {} total", stats.total);
    println!("           {} assigned", stats.assigned);
    println!("           {} available", stats.available());

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_list() {
        let contents = "# pool batch 1\nhttps://rpc.example/1\n\n  https://rpc.example/2  \n#https://rpc.example/disabled\n";
        assert_eq!(
            parse_url_list(contents),
            vec!["https://rpc.example/1", "https://rpc.example/2"]
        );
    }

    #[test]
    fn test_db_config_requires_url() {
        assert!(get_db_config(None, 4).is_err());
        assert!(get_db_config(Some("not-a-url".into()), 4).is_err());

        let config = get_db_config(Some("postgres://localhost/dispenser".into()), 4).unwrap();
        assert_eq!(config.max_connections, 4);
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
